// log.rs
//! Event recorder. Nodes push entries into `LOG_CHANNEL`; whoever owns
//! storage drains it and writes one CSV row per entry, preceded by the
//! schema from `LogEntry::write_schema`.
use core::fmt::Write;
use core::sync::atomic::Ordering;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, TICK_HZ};
use portable_atomic::AtomicU32;
use proc_macros::TelemetryPayload;

use crate::packet::{CommandPacket, MAX_TELEMETRY_FIELDS, SLOT_COUNT, TelemetryPacket};
use crate::types::{Mode, NodeAddress, Tickstamp};

// A safe upper bound for any single CSV row (Tag + Timestamp + Data + Newline)
pub const MAX_LOG_LINE_LEN: usize = 256;

pub const MAX_LOG_MSG_LEN: usize = 48;
pub type LogMessage = heapless::String<MAX_LOG_MSG_LEN>;

pub const LOG_CHANNEL_CAPACITY: usize = 128;

/// Global counter for entries dropped because the channel was full
pub static DROPPED_LOGS: AtomicU32 = AtomicU32::new(0);

// Sized for a burst of telemetry from every peer plus mode changes
pub static LOG_CHANNEL: Channel<CriticalSectionRawMutex, LogEntry, LOG_CHANNEL_CAPACITY> = Channel::new();

/// Queues `entry` without blocking; counts it as dropped when the channel is full.
pub fn record(entry: LogEntry) {
    if LOG_CHANNEL.try_send(entry).is_err() {
        DROPPED_LOGS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Wall tickstamp for entries produced outside a tick (log lines, events).
pub fn now_ticks() -> Tickstamp {
    Instant::now().as_ticks()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn tag(&self) -> &'static str {
        match self {
            LogLevel::Info => "I",
            LogLevel::Warn => "W",
            LogLevel::Error => "E",
        }
    }
}

#[derive(Clone, Debug)]
pub enum LogEntry {
    Command(CommandRecord),
    Telemetry(TelemetryRecord),
    Mode(ModeRecord),
    Event(Tickstamp, &'static str),
    Log(Tickstamp, LogLevel, LogMessage),
    RecorderHealth(RecorderHealth),
}

impl LogEntry {
    pub fn write_schema<const SIZE: usize>(cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result {
        writeln!(cursor, "# SCHEMA DEFINITION")?;
        writeln!(cursor, "# METADATA,tick_hz,{}", TICK_HZ)?;
        writeln!(cursor, "# {},tickstamp,{}", CommandRecord::TAG, CommandRecord::CSV_HEADER)?;
        writeln!(cursor, "# {},tickstamp,{}", TelemetryRecord::TAG, TelemetryRecord::CSV_HEADER)?;
        writeln!(cursor, "# {},tickstamp,{}", ModeRecord::TAG, ModeRecord::CSV_HEADER)?;
        writeln!(cursor, "# E,tickstamp,event_msg")?;
        writeln!(cursor, "# L,tickstamp,level,msg")?;
        writeln!(cursor, "# {},tickstamp,{}", RecorderHealth::TAG, RecorderHealth::CSV_HEADER)?;
        Ok(())
    }

    pub fn format_to<const SIZE: usize>(&self, cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result {
        match self {
            LogEntry::Command(data) => self.write_line(data.tickstamp, data, cursor),
            LogEntry::Telemetry(data) => self.write_line(data.tickstamp, data, cursor),
            LogEntry::Mode(data) => self.write_line(data.tickstamp, data, cursor),
            LogEntry::Event(ts, data) => self.write_line(*ts, data, cursor),
            LogEntry::Log(ts, level, msg) => {
                write!(cursor, "L,{},{},", ts, level.tag())?;
                cursor.write_str(msg.as_str())?;
                writeln!(cursor)
            }
            LogEntry::RecorderHealth(data) => self.write_line(data.tickstamp, data, cursor),
        }
    }

    // Every row is: TAG, TIMESTAMP, PAYLOAD... \n
    fn write_line<T: Loggable, const SIZE: usize>(
        &self,
        ts: Tickstamp,
        data: &T,
        cursor: &mut LogBuffer<SIZE>,
    ) -> core::fmt::Result {
        write!(cursor, "{},{},", T::TAG, ts)?;
        data.format_payload(cursor)?;
        writeln!(cursor)
    }
}

// A trait for types that can be logged
pub trait Loggable {
    /// The 'Tag' that identifies this row (e.g., 'C', 'T', 'M')
    const TAG: &'static str;

    /// Only write the fields and commas. Do NOT write the tag, timestamp, or \n.
    fn format_payload<const SIZE: usize>(&self, cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result;
}

fn write_values<const SIZE: usize>(cursor: &mut LogBuffer<SIZE>, values: &[i16]) -> core::fmt::Result {
    for value in values {
        write!(cursor, ",{}", value)?;
    }
    Ok(())
}

/// A command sent (commander) or applied (actuator).
#[derive(Clone, Copy, Debug, PartialEq, Eq, TelemetryPayload)]
pub struct CommandRecord {
    pub tickstamp: Tickstamp,
    pub node: u8,
    pub opcode: u8,
    pub slots: [i16; 12],
}

const _: () = assert!(SLOT_COUNT == 12, "CommandRecord columns assume 12 slots");

impl CommandRecord {
    pub fn new(now: Instant, node: NodeAddress, packet: &CommandPacket) -> Self {
        Self {
            tickstamp: now.as_ticks(),
            node: node.0,
            opcode: packet.opcode as u8,
            slots: packet.slots,
        }
    }
}

impl Loggable for CommandRecord {
    const TAG: &'static str = "C";
    fn format_payload<const SIZE: usize>(&self, cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result {
        write!(cursor, "{},{}", self.node, self.opcode)?;
        write_values(cursor, &self.slots)
    }
}

/// A telemetry frame as seen by the commander. Unused fields are zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TelemetryPayload)]
pub struct TelemetryRecord {
    pub tickstamp: Tickstamp,
    pub node: u8,
    pub status: u8,
    pub echo: u8,
    pub field_count: u8,
    pub fields: [i16; 12],
}

const _: () = assert!(MAX_TELEMETRY_FIELDS == 12, "TelemetryRecord columns assume 12 fields");

impl TelemetryRecord {
    pub fn new(now: Instant, node: NodeAddress, packet: &TelemetryPacket) -> Self {
        let mut fields = [0i16; MAX_TELEMETRY_FIELDS];
        for (dst, src) in fields.iter_mut().zip(packet.fields.iter()) {
            *dst = *src;
        }
        Self {
            tickstamp: now.as_ticks(),
            node: node.0,
            status: packet.status.bits(),
            echo: packet.echo,
            field_count: packet.fields.len() as u8,
            fields,
        }
    }
}

impl Loggable for TelemetryRecord {
    const TAG: &'static str = "T";
    fn format_payload<const SIZE: usize>(&self, cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result {
        write!(cursor, "{},{},{},{}", self.node, self.status, self.echo, self.field_count)?;
        write_values(cursor, &self.fields)
    }
}

/// A mode transition on one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TelemetryPayload)]
pub struct ModeRecord {
    pub tickstamp: Tickstamp,
    pub node: u8,
    pub mode: u8,
    pub frame: u16,
}

impl ModeRecord {
    pub fn new(now: Instant, node: NodeAddress, mode: Mode, frame: u16) -> Self {
        Self {
            tickstamp: now.as_ticks(),
            node: node.0,
            mode: mode as u8,
            frame,
        }
    }
}

impl Loggable for ModeRecord {
    const TAG: &'static str = "M";
    fn format_payload<const SIZE: usize>(&self, cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result {
        write!(cursor, "{},{},{}", self.node, self.mode, self.frame)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TelemetryPayload)]
pub struct RecorderHealth {
    /// Tickstamp of when the health was captured.
    pub tickstamp: Tickstamp,
    pub dropped_logs: u32,
    pub channel_len: usize,
    pub channel_cap: usize,
}

impl RecorderHealth {
    pub fn capture(now: Instant) -> Self {
        Self {
            tickstamp: now.as_ticks(),
            dropped_logs: DROPPED_LOGS.load(Ordering::Relaxed),
            channel_len: LOG_CHANNEL.len(),
            channel_cap: LOG_CHANNEL_CAPACITY,
        }
    }
}

impl Loggable for RecorderHealth {
    const TAG: &'static str = "RH";
    fn format_payload<const SIZE: usize>(&self, cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result {
        write!(cursor, "{},{},{}", self.dropped_logs, self.channel_len, self.channel_cap)
    }
}

impl Loggable for &'static str {
    const TAG: &'static str = "E";
    fn format_payload<const SIZE: usize>(&self, cursor: &mut LogBuffer<SIZE>) -> core::fmt::Result {
        cursor.write_str(self)
    }
}

// Helper for formatting into a buffer
#[repr(align(4))]
pub struct LogBuffer<const SIZE: usize> {
    buf: [u8; SIZE],
    pub pos: usize,
}

impl<const SIZE: usize> core::fmt::Write for LogBuffer<SIZE> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remainder = self.buf.len() - self.pos;
        if remainder < bytes.len() {
            return Err(core::fmt::Error);
        }

        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

impl<const SIZE: usize> LogBuffer<SIZE> {
    pub fn new() -> Self {
        Self {
            buf: [0u8; SIZE],
            pos: 0,
        }
    }

    /// Attempts to format a LogEntry into the buffer.
    /// Returns the number of bytes written, or an error if it doesn't fit.
    /// On error the buffer is rolled back to where it was.
    pub fn write_entry(&mut self, entry: &LogEntry) -> Result<usize, core::fmt::Error> {
        let start_pos = self.pos;
        if let Err(e) = entry.format_to(self) {
            self.pos = start_pos;
            return Err(e);
        }
        Ok(self.pos - start_pos)
    }

    pub fn space_remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn get_active_buffer(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl<const SIZE: usize> Default for LogBuffer<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusFlags;
    use crate::types::Opcode;

    fn text<const SIZE: usize>(buffer: &LogBuffer<SIZE>) -> &str {
        core::str::from_utf8(buffer.get_active_buffer()).unwrap()
    }

    #[test]
    fn test_headers_expand_arrays() {
        assert!(CommandRecord::CSV_HEADER.starts_with("node,opcode,slots_0,slots_1,"));
        assert!(CommandRecord::CSV_HEADER.ends_with(",slots_11"));
        assert_eq!(ModeRecord::CSV_HEADER, "node,mode,frame");
        assert_eq!(
            RecorderHealth::CSV_HEADER,
            "dropped_logs,channel_len,channel_cap"
        );
    }

    #[test]
    fn test_command_row() {
        let packet = CommandPacket::new(Opcode::SetSpeed).with_slot(2, 500);
        let entry = LogEntry::Command(CommandRecord::new(Instant::from_ticks(42), NodeAddress(0), &packet));
        let mut buffer = LogBuffer::<MAX_LOG_LINE_LEN>::new();
        buffer.write_entry(&entry).unwrap();
        assert_eq!(text(&buffer), "C,42,0,1,0,0,500,0,0,0,0,0,0,0,0,0\n");
    }

    #[test]
    fn test_telemetry_row_pads_fields() {
        let packet = TelemetryPacket {
            status: StatusFlags(0b0010_0011),
            echo: 1,
            fields: heapless::Vec::from_slice(&[1, -2, 3]).unwrap(),
        };
        let entry = LogEntry::Telemetry(TelemetryRecord::new(Instant::from_ticks(7), NodeAddress(1), &packet));
        let mut buffer = LogBuffer::<MAX_LOG_LINE_LEN>::new();
        buffer.write_entry(&entry).unwrap();
        assert_eq!(text(&buffer), "T,7,1,35,1,3,1,-2,3,0,0,0,0,0,0,0,0,0\n");
    }

    #[test]
    fn test_log_and_event_rows() {
        let mut buffer = LogBuffer::<MAX_LOG_LINE_LEN>::new();
        let msg = LogMessage::try_from("peer 3 stale").unwrap();
        buffer.write_entry(&LogEntry::Log(5, LogLevel::Warn, msg)).unwrap();
        buffer.write_entry(&LogEntry::Event(6, "shutdown")).unwrap();
        assert_eq!(text(&buffer), "L,5,W,peer 3 stale\nE,6,shutdown\n");
    }

    #[test]
    fn test_overflow_rolls_back() {
        let mut buffer = LogBuffer::<16>::new();
        buffer.write_entry(&LogEntry::Event(1, "ok")).unwrap();
        let before = buffer.pos;
        assert!(buffer.write_entry(&LogEntry::Event(2, "much too long for this")).is_err());
        assert_eq!(buffer.pos, before);
        assert_eq!(text(&buffer), "E,1,ok\n");
    }

    #[test]
    fn test_schema_lists_every_tag() {
        let mut buffer = LogBuffer::<2048>::new();
        LogEntry::write_schema(&mut buffer).unwrap();
        let schema = text(&buffer);
        for tag in ["# C,", "# T,", "# M,", "# E,", "# L,", "# RH,"] {
            assert!(schema.contains(tag), "missing {}", tag);
        }
    }
}
