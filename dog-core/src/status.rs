// status.rs
/// Status byte carried in every telemetry frame.
///
/// | bit | meaning                                   |
/// |-----|-------------------------------------------|
/// | 0   | battery above threshold                   |
/// | 1-4 | port 0-3 device present                   |
/// | 5   | command (actuator) / all peers (commander) fresh |
/// | 6   | node is out of IDLE (manual mode)         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    pub const BATTERY_OK: u8 = 0b0000_0001;
    pub const FRESH: u8 = 0b0010_0000;
    pub const MANUAL: u8 = 0b0100_0000;
    pub const MAX_PORTS: usize = 4;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Presence bit for port `i` (0-based).
    pub const fn port_bit(port: usize) -> u8 {
        1 << (port + 1)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn set(&mut self, bit: u8, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub const fn contains(self, bits: u8) -> bool {
        self.0 & bits == bits
    }

    pub const fn battery_ok(self) -> bool {
        self.contains(Self::BATTERY_OK)
    }

    pub const fn fresh(self) -> bool {
        self.contains(Self::FRESH)
    }

    pub const fn manual(self) -> bool {
        self.contains(Self::MANUAL)
    }

    pub const fn port_present(self, port: usize) -> bool {
        self.contains(Self::port_bit(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_bits_follow_battery_bit() {
        assert_eq!(StatusFlags::port_bit(0), 0b0000_0010);
        assert_eq!(StatusFlags::port_bit(3), 0b0001_0000);
    }

    #[test]
    fn test_set_and_clear() {
        let mut status = StatusFlags::empty();
        status.set(StatusFlags::FRESH, true);
        status.set(StatusFlags::port_bit(1), true);
        assert!(status.fresh());
        assert!(status.port_present(1));
        status.set(StatusFlags::FRESH, false);
        assert!(!status.fresh());
        assert_eq!(status.bits(), 0b0000_0100);
    }
}
