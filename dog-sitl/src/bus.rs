// bus.rs
//! Simulated broadcast radio. One `DataCell` per channel holds the
//! advertisement currently on air; readers remember the last version they
//! consumed so every datagram is seen at most once per reader.
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use dog_core::datacells::DataCell;
use dog_core::packet::{Frame, MAX_FRAME_LEN};
use dog_core::topology::NODES;
use dog_core::{Radio, trace};

pub const CHANNELS: usize = NODES.len();

/// Copyable payload for a `DataCell`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Datagram {
    len: u8,
    bytes: [u8; MAX_FRAME_LEN],
}

impl Datagram {
    pub const EMPTY: Datagram = Datagram {
        len: 0,
        bytes: [0; MAX_FRAME_LEN],
    };

    /// `None` if the payload does not fit an advertisement.
    pub fn new(payload: &[u8]) -> Option<Self> {
        if payload.len() > MAX_FRAME_LEN {
            return None;
        }
        let mut datagram = Self::EMPTY;
        datagram.bytes[..payload.len()].copy_from_slice(payload);
        datagram.len = payload.len() as u8;
        Some(datagram)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

pub struct Bus {
    channels: [DataCell<Datagram>; CHANNELS],
    silenced: [AtomicBool; CHANNELS],
    missed: AtomicU32,
}

impl Bus {
    pub const fn new() -> Self {
        Self {
            channels: [const { DataCell::new(Datagram::EMPTY) }; CHANNELS],
            silenced: [const { AtomicBool::new(false) }; CHANNELS],
            missed: AtomicU32::new(0),
        }
    }

    /// A silenced channel keeps its last datagram but stops replacing it,
    /// as if its node had gone out of range.
    pub fn silence(&self, channel: u8, silenced: bool) {
        if let Some(flag) = self.silenced.get(channel as usize) {
            flag.store(silenced, Ordering::Relaxed);
        }
    }

    pub fn is_silenced(&self, channel: u8) -> bool {
        self.silenced
            .get(channel as usize)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn publish(&self, channel: u8, payload: &[u8]) {
        if self.is_silenced(channel) {
            return;
        }
        let (Some(cell), Some(datagram)) = (self.channels.get(channel as usize), Datagram::new(payload)) else {
            return;
        };
        cell.update(datagram);
    }

    /// Observes missed by lossy readers so far.
    pub fn missed(&self) -> u32 {
        self.missed.load(Ordering::Relaxed)
    }

    /// A radio transmitting on `channel`. With `miss_every = n`, every n-th
    /// reception attempt fails; the datagram stays on air for the next one.
    pub fn radio(&self, channel: u8, miss_every: Option<u32>) -> BusRadio<'_> {
        BusRadio {
            bus: self,
            channel,
            seen: [0; CHANNELS],
            miss_every,
            attempts: 0,
        }
    }
}

pub struct BusRadio<'a> {
    bus: &'a Bus,
    channel: u8,
    seen: [u32; CHANNELS],
    miss_every: Option<u32>,
    attempts: u32,
}

impl Radio for BusRadio<'_> {
    fn broadcast(&mut self, payload: &[u8]) {
        self.bus.publish(self.channel, payload);
    }

    fn observe(&mut self, channel: u8) -> Option<Frame> {
        let index = channel as usize;
        let cell = self.bus.channels.get(index)?;
        let (version, datagram) = cell.read_if_newer(self.seen[index])?;

        if let Some(n) = self.miss_every.filter(|n| *n > 0) {
            self.attempts = self.attempts.wrapping_add(1);
            if self.attempts % n == 0 {
                self.bus.missed.fetch_add(1, Ordering::Relaxed);
                trace!("radio {}: missed channel {}", self.channel, channel);
                return None;
            }
        }

        self.seen[index] = version;
        Frame::from_slice(datagram.as_slice()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_datagram_is_seen_once() {
        let bus = Bus::new();
        let mut sender = bus.radio(1, None);
        let mut reader = bus.radio(0, None);

        assert!(reader.observe(1).is_none());
        sender.broadcast(&[1, 2, 3]);
        assert_eq!(reader.observe(1).unwrap().as_slice(), &[1, 2, 3]);
        assert!(reader.observe(1).is_none());

        // An identical payload is still a new advertisement.
        sender.broadcast(&[1, 2, 3]);
        assert!(reader.observe(1).is_some());
    }

    #[test]
    fn test_readers_are_independent() {
        let bus = Bus::new();
        let mut sender = bus.radio(0, None);
        let mut a = bus.radio(1, None);
        let mut b = bus.radio(2, None);

        sender.broadcast(&[9]);
        assert!(a.observe(0).is_some());
        assert!(b.observe(0).is_some());
        assert!(a.observe(0).is_none());
    }

    #[test]
    fn test_missed_datagram_stays_on_air() {
        let bus = Bus::new();
        let mut sender = bus.radio(0, None);
        let mut lossy = bus.radio(3, Some(2));

        sender.broadcast(&[1]);
        assert!(lossy.observe(0).is_some());
        sender.broadcast(&[2]);
        assert!(lossy.observe(0).is_none());
        assert_eq!(lossy.observe(0).unwrap().as_slice(), &[2]);
        assert_eq!(bus.missed(), 1);
    }

    #[test]
    fn test_silenced_channel_keeps_last_datagram() {
        let bus = Bus::new();
        let mut sender = bus.radio(0, None);
        let mut reader = bus.radio(1, None);

        sender.broadcast(&[1]);
        bus.silence(0, true);
        sender.broadcast(&[2]);
        assert_eq!(reader.observe(0).unwrap().as_slice(), &[1]);
        assert!(reader.observe(0).is_none());

        bus.silence(0, false);
        sender.broadcast(&[3]);
        assert_eq!(reader.observe(0).unwrap().as_slice(), &[3]);
    }

    #[test]
    fn test_oversized_payload_is_not_sent() {
        let bus = Bus::new();
        let mut sender = bus.radio(0, None);
        let mut reader = bus.radio(1, None);
        sender.broadcast(&[0; MAX_FRAME_LEN + 1]);
        assert!(reader.observe(0).is_none());
        assert!(Datagram::new(&[0; MAX_FRAME_LEN]).is_some());
    }
}
