// types.rs
pub type Tickstamp = u64;

/// Radio address of a node. Also the channel it broadcasts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeAddress(pub u8);

impl NodeAddress {
    pub const COMMANDER: NodeAddress = NodeAddress(0);

    pub const fn channel(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    KeepAlive = 0,  // Proof of life, no action
    SetSpeed = 1,   // Run at per-mille of the speed limit, 0 brakes
    SetAngle = 2,   // Track an absolute angle
    ResetAngle = 3, // Rezero the angle reference without moving
    Shutdown = 4,   // Power the node down
}

impl Opcode {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Opcode::KeepAlive),
            1 => Some(Opcode::SetSpeed),
            2 => Some(Opcode::SetAngle),
            3 => Some(Opcode::ResetAngle),
            4 => Some(Opcode::Shutdown),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    #[default]
    Idle = 0,     // Following the commander
    Active = 1,   // Button held, waiting for release
    Select = 2,   // Manual control
    Inactive = 3, // Action taken, waiting for release
}

/// What the node loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    Continue,
    Shutdown,
}
