// topology.rs
// Build-time description of the robot: which node owns which slots, ports and
// telemetry fields. Sender and receivers decode with this same table.
use crate::packet::{MAX_TELEMETRY_FIELDS, SLOT_COUNT};
use crate::status::StatusFlags;
use crate::types::NodeAddress;

/// A device attached to one of a hub's ports, in port order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortKind {
    /// Motor driven from command slot `slot` (absolute slot index).
    Motor { slot: u8 },
    /// Three axis tilt sensor (raw readings clamped at +/-45).
    Tilt,
    /// Distance sensor.
    Distance,
}

impl PortKind {
    /// Telemetry fields contributed by this port.
    pub const fn field_count(&self) -> usize {
        match self {
            PortKind::Motor { .. } => 1,
            PortKind::Tilt => 3,
            PortKind::Distance => 1,
        }
    }
}

/// Contiguous range of command slots a node decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotWindow {
    pub first: u8,
    pub len: u8,
}

impl SlotWindow {
    pub const EMPTY: SlotWindow = SlotWindow { first: 0, len: 0 };

    pub const fn contains(&self, slot: u8) -> bool {
        slot >= self.first && slot < self.first + self.len
    }

    pub const fn end(&self) -> usize {
        self.first as usize + self.len as usize
    }
}

/// What an actuator echoes back in its telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EchoMode {
    /// Raw opcode byte of the last applied command.
    LastOpcode,
    /// XOR checksum of the last applied command frame.
    Checksum,
}

#[derive(Debug, Clone, Copy)]
pub struct NodeSpec {
    pub address: NodeAddress,
    pub name: &'static str,
    pub ports: &'static [PortKind],
    pub window: SlotWindow,
    pub echo: EchoMode,
}

impl NodeSpec {
    /// Acceleration (3) followed by the fields of every port.
    pub const fn telemetry_fields(&self) -> usize {
        let mut total = 3;
        let mut i = 0;
        while i < self.ports.len() {
            total += self.ports[i].field_count();
            i += 1;
        }
        total
    }

    /// Presence bits of the motor ports.
    pub const fn motor_mask(&self) -> u8 {
        let mut mask = 0;
        let mut i = 0;
        while i < self.ports.len() {
            if let PortKind::Motor { .. } = self.ports[i] {
                mask |= StatusFlags::port_bit(i);
            }
            i += 1;
        }
        mask
    }

    /// Status bits a healthy, commanded actuator reports.
    pub const fn healthy_status(&self) -> u8 {
        StatusFlags::BATTERY_OK | StatusFlags::FRESH | self.motor_mask()
    }

    /// Mask applied to the status before comparing against `healthy_status`:
    /// every port bit the node could report plus battery and freshness.
    pub const fn health_mask(&self) -> u8 {
        let mut mask = StatusFlags::BATTERY_OK | StatusFlags::FRESH;
        let mut i = 0;
        while i < StatusFlags::MAX_PORTS {
            if i >= self.ports.len() {
                mask |= StatusFlags::port_bit(i);
            }
            i += 1;
        }
        mask | self.motor_mask()
    }

    pub const fn is_commander(&self) -> bool {
        self.address.0 == NodeAddress::COMMANDER.0
    }
}

const LEG_1_PORTS: [PortKind; 3] = [PortKind::Motor { slot: 2 }, PortKind::Tilt, PortKind::Distance];
const LEG_2_PORTS: [PortKind; 3] = [PortKind::Motor { slot: 5 }, PortKind::Tilt, PortKind::Distance];
const LEG_3_PORTS: [PortKind; 3] = [PortKind::Motor { slot: 8 }, PortKind::Tilt, PortKind::Distance];
const LEG_4_PORTS: [PortKind; 3] = [PortKind::Motor { slot: 11 }, PortKind::Tilt, PortKind::Distance];
const BODY_FRONT_PORTS: [PortKind; 4] = [
    PortKind::Motor { slot: 0 },
    PortKind::Motor { slot: 1 },
    PortKind::Motor { slot: 3 },
    PortKind::Motor { slot: 4 },
];
const BODY_REAR_PORTS: [PortKind; 4] = [
    PortKind::Motor { slot: 6 },
    PortKind::Motor { slot: 7 },
    PortKind::Motor { slot: 9 },
    PortKind::Motor { slot: 10 },
];

/// Slots are grouped per leg as (mount, top, bottom). Leg hubs drive the
/// bottom joint, the two body hubs drive mount and top of two legs each.
pub const NODES: [NodeSpec; 7] = [
    NodeSpec {
        address: NodeAddress(0),
        name: "commander",
        ports: &[],
        window: SlotWindow::EMPTY,
        echo: EchoMode::LastOpcode,
    },
    NodeSpec {
        address: NodeAddress(1),
        name: "leg-1",
        ports: &LEG_1_PORTS,
        window: SlotWindow { first: 2, len: 1 },
        echo: EchoMode::LastOpcode,
    },
    NodeSpec {
        address: NodeAddress(2),
        name: "leg-2",
        ports: &LEG_2_PORTS,
        window: SlotWindow { first: 5, len: 1 },
        echo: EchoMode::LastOpcode,
    },
    NodeSpec {
        address: NodeAddress(3),
        name: "leg-3",
        ports: &LEG_3_PORTS,
        window: SlotWindow { first: 8, len: 1 },
        echo: EchoMode::LastOpcode,
    },
    NodeSpec {
        address: NodeAddress(4),
        name: "leg-4",
        ports: &LEG_4_PORTS,
        window: SlotWindow { first: 11, len: 1 },
        echo: EchoMode::LastOpcode,
    },
    NodeSpec {
        address: NodeAddress(5),
        name: "body-front",
        ports: &BODY_FRONT_PORTS,
        window: SlotWindow { first: 0, len: 6 },
        echo: EchoMode::Checksum,
    },
    NodeSpec {
        address: NodeAddress(6),
        name: "body-rear",
        ports: &BODY_REAR_PORTS,
        window: SlotWindow { first: 6, len: 6 },
        echo: EchoMode::Checksum,
    },
];

pub const COMMANDER: &NodeSpec = &NODES[0];
pub const PEER_COUNT: usize = NODES.len() - 1;

const _: () = assert!(check(&NODES).is_ok(), "Invalid node topology!");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TopologyError {
    /// Table entry `index` does not carry address `index`.
    AddressMismatch { index: usize },
    MissingCommander,
    TooManyPorts { address: u8 },
    TooManyFields { address: u8 },
    WindowOutOfRange { address: u8 },
    /// Motor slot outside the node's window.
    SlotOutsideWindow { address: u8, slot: u8 },
    /// Two motors driven from the same slot.
    SlotOwnedTwice { slot: u8 },
    /// More than one tilt sensor; a node runs a single tilt estimator.
    TooManyTilt { address: u8 },
    /// Node used in the wrong role (actuator driver on the commander or vice versa).
    RoleMismatch { address: u8 },
}

/// Validates a topology table. Used at compile time for `NODES`.
pub const fn check(nodes: &[NodeSpec]) -> Result<(), TopologyError> {
    if nodes.is_empty() || nodes[0].address.0 != NodeAddress::COMMANDER.0 {
        return Err(TopologyError::MissingCommander);
    }
    let mut owners = [false; SLOT_COUNT];
    let mut n = 0;
    while n < nodes.len() {
        let node = &nodes[n];
        let address = node.address.0;
        if address as usize != n {
            return Err(TopologyError::AddressMismatch { index: n });
        }
        if node.ports.len() > StatusFlags::MAX_PORTS {
            return Err(TopologyError::TooManyPorts { address });
        }
        if node.telemetry_fields() > MAX_TELEMETRY_FIELDS {
            return Err(TopologyError::TooManyFields { address });
        }
        if node.window.end() > SLOT_COUNT {
            return Err(TopologyError::WindowOutOfRange { address });
        }
        let mut tilts = 0;
        let mut p = 0;
        while p < node.ports.len() {
            if let PortKind::Tilt = node.ports[p] {
                tilts += 1;
                if tilts > 1 {
                    return Err(TopologyError::TooManyTilt { address });
                }
            }
            if let PortKind::Motor { slot } = node.ports[p] {
                if !node.window.contains(slot) {
                    return Err(TopologyError::SlotOutsideWindow { address, slot });
                }
                if owners[slot as usize] {
                    return Err(TopologyError::SlotOwnedTwice { slot });
                }
                owners[slot as usize] = true;
            }
            p += 1;
        }
        n += 1;
    }
    Ok(())
}

pub fn node(address: NodeAddress) -> Option<&'static NodeSpec> {
    NODES.get(address.index())
}

/// Every node except the commander.
pub fn peers() -> &'static [NodeSpec] {
    &NODES[1..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_layouts() {
        assert_eq!(NODES[1].telemetry_fields(), 8);
        assert_eq!(NODES[5].telemetry_fields(), 7);
        assert_eq!(COMMANDER.telemetry_fields(), 3);
    }

    #[test]
    fn test_health_masks() {
        // Leg: battery, motor on port 0, fresh; tilt and distance are optional.
        assert_eq!(NODES[1].healthy_status(), 0b0010_0011);
        assert_eq!(NODES[1].health_mask(), 0b0011_0011);
        // Body: battery, four motors, fresh.
        assert_eq!(NODES[5].healthy_status(), 0b0011_1111);
        assert_eq!(NODES[5].health_mask(), 0b0011_1111);
    }

    #[test]
    fn test_default_topology_is_valid() {
        assert_eq!(check(&NODES), Ok(()));
        assert!(COMMANDER.is_commander());
        assert_eq!(peers().len(), PEER_COUNT);
        assert_eq!(node(NodeAddress(4)).map(|n| n.name), Some("leg-4"));
        assert!(node(NodeAddress(9)).is_none());
    }

    #[test]
    fn test_duplicate_slot_is_rejected() {
        let mut nodes = NODES;
        nodes[2].window = SlotWindow { first: 2, len: 1 };
        nodes[2].ports = &LEG_1_PORTS;
        assert_eq!(check(&nodes), Err(TopologyError::SlotOwnedTwice { slot: 2 }));
    }

    #[test]
    fn test_motor_outside_window_is_rejected() {
        let mut nodes = NODES;
        nodes[1].window = SlotWindow { first: 3, len: 1 };
        assert_eq!(
            check(&nodes),
            Err(TopologyError::SlotOutsideWindow { address: 1, slot: 2 })
        );
    }

    #[test]
    fn test_second_tilt_sensor_is_rejected() {
        const TWO_TILTS: [PortKind; 3] = [PortKind::Motor { slot: 2 }, PortKind::Tilt, PortKind::Tilt];
        let mut nodes = NODES;
        nodes[1].ports = &TWO_TILTS;
        assert_eq!(check(&nodes), Err(TopologyError::TooManyTilt { address: 1 }));
    }

    #[test]
    fn test_address_must_match_position() {
        let mut nodes = NODES;
        nodes.swap(3, 4);
        assert_eq!(check(&nodes), Err(TopologyError::AddressMismatch { index: 3 }));
    }
}
