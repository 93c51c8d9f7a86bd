// packet.rs
//! Fixed-layout radio frames.
//!
//! Every node must use the same layout. The transport only delivers short
//! advertisement payloads without any length guarantee, so frames are never
//! self-describing: the size of a frame is a function of its kind (and, for
//! telemetry, of the sending node) and anything else is dropped.
//!
//! # Command frame (25 bytes)
//!
//! | offset | size | content                      |
//! |--------|------|------------------------------|
//! | 0      | 1    | opcode                       |
//! | 1 + 2k | 2    | slot `k` (i16 LE), k in 0..12 |
//!
//! # Telemetry frame (2 + 2N bytes)
//!
//! | offset | size | content                      |
//! |--------|------|------------------------------|
//! | 0      | 1    | status flags                 |
//! | 1      | 1    | echo (last opcode or checksum) |
//! | 2 + 2i | 2    | field `i` (i16 LE)           |
use crate::status::StatusFlags;
use crate::types::Opcode;

/// Number of target slots in a command frame.
pub const SLOT_COUNT: usize = 12;
pub const COMMAND_FRAME_LEN: usize = 1 + 2 * SLOT_COUNT;

pub const MAX_TELEMETRY_FIELDS: usize = 12;
pub const TELEMETRY_HEADER_LEN: usize = 2;

/// Largest payload the broadcast transport carries.
pub const MAX_FRAME_LEN: usize = 31;

pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

const _: () = assert!(COMMAND_FRAME_LEN <= MAX_FRAME_LEN);
const _: () = assert!(TELEMETRY_HEADER_LEN + 2 * MAX_TELEMETRY_FIELDS <= MAX_FRAME_LEN);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Frame length does not match the fixed size for its kind.
    Malformed { expected: usize, actual: usize },
    /// Well-framed command with an opcode this build does not know.
    UnknownOpcode(u8),
    /// Telemetry layout larger than a frame can carry.
    TooManyFields(usize),
}

/// Byte offset of slot `k` inside a command frame.
pub const fn slot_offset(k: usize) -> usize {
    1 + 2 * k
}

pub const fn telemetry_frame_len(field_count: usize) -> usize {
    TELEMETRY_HEADER_LEN + 2 * field_count
}

/// XOR of all bytes. Detects a single flipped bit, nothing more.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandPacket {
    pub opcode: Opcode,
    pub slots: [i16; SLOT_COUNT],
}

impl CommandPacket {
    pub const fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            slots: [0; SLOT_COUNT],
        }
    }

    pub const fn keep_alive() -> Self {
        Self::new(Opcode::KeepAlive)
    }

    pub const fn shutdown() -> Self {
        Self::new(Opcode::Shutdown)
    }

    /// Builder used by the commander to address a single slot.
    pub fn with_slot(mut self, slot: usize, value: i16) -> Self {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = value;
        }
        self
    }

    pub fn slot(&self, slot: usize) -> i16 {
        self.slots.get(slot).copied().unwrap_or(0)
    }

    /// Slots `range`, truncated to the frame.
    pub fn slice(&self, range: core::ops::Range<usize>) -> &[i16] {
        let end = range.end.min(SLOT_COUNT);
        let start = range.start.min(end);
        &self.slots[start..end]
    }

    pub fn encode(&self) -> [u8; COMMAND_FRAME_LEN] {
        encode_command(self.opcode, &self.slots)
    }
}

pub fn encode_command(opcode: Opcode, slots: &[i16; SLOT_COUNT]) -> [u8; COMMAND_FRAME_LEN] {
    let mut frame = [0u8; COMMAND_FRAME_LEN];
    frame[0] = opcode as u8;
    for (k, value) in slots.iter().enumerate() {
        let at = slot_offset(k);
        frame[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
    frame
}

pub fn decode_command(bytes: &[u8]) -> Result<CommandPacket, PacketError> {
    if bytes.len() != COMMAND_FRAME_LEN {
        return Err(PacketError::Malformed {
            expected: COMMAND_FRAME_LEN,
            actual: bytes.len(),
        });
    }
    let opcode = Opcode::from_u8(bytes[0]).ok_or(PacketError::UnknownOpcode(bytes[0]))?;

    let mut slots = [0i16; SLOT_COUNT];
    for (k, slot) in slots.iter_mut().enumerate() {
        let at = slot_offset(k);
        *slot = i16::from_le_bytes([bytes[at], bytes[at + 1]]);
    }
    Ok(CommandPacket { opcode, slots })
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryPacket {
    pub status: StatusFlags,
    /// Last opcode applied, or the checksum of the last applied command frame.
    pub echo: u8,
    pub fields: heapless::Vec<i16, MAX_TELEMETRY_FIELDS>,
}

impl TelemetryPacket {
    pub fn encode(&self) -> Result<Frame, PacketError> {
        encode_telemetry(self.status, self.echo, &self.fields)
    }
}

pub fn encode_telemetry(status: StatusFlags, echo: u8, fields: &[i16]) -> Result<Frame, PacketError> {
    if fields.len() > MAX_TELEMETRY_FIELDS {
        return Err(PacketError::TooManyFields(fields.len()));
    }
    let mut frame = Frame::new();
    let overflow = |_| PacketError::TooManyFields(fields.len());
    frame.push(status.bits()).map_err(overflow)?;
    frame.push(echo).map_err(overflow)?;
    for value in fields {
        frame
            .extend_from_slice(&value.to_le_bytes())
            .map_err(|_| PacketError::TooManyFields(fields.len()))?;
    }
    Ok(frame)
}

/// Decodes a telemetry frame sent by a node whose layout has `field_count` fields.
pub fn decode_telemetry(bytes: &[u8], field_count: usize) -> Result<TelemetryPacket, PacketError> {
    if field_count > MAX_TELEMETRY_FIELDS {
        return Err(PacketError::TooManyFields(field_count));
    }
    let expected = telemetry_frame_len(field_count);
    if bytes.len() != expected {
        return Err(PacketError::Malformed {
            expected,
            actual: bytes.len(),
        });
    }

    let mut fields = heapless::Vec::new();
    for chunk in bytes[TELEMETRY_HEADER_LEN..].chunks_exact(2) {
        fields
            .push(i16::from_le_bytes([chunk[0], chunk[1]]))
            .map_err(|_| PacketError::TooManyFields(field_count))?;
    }
    Ok(TelemetryPacket {
        status: StatusFlags(bytes[0]),
        echo: bytes[1],
        fields,
    })
}
