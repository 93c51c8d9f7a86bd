// recorder.rs
//! Drains the core's log channel into a CSV sink.
use std::io::{self, Write};
use std::time::{Duration, Instant};

use dog_core::log::{LOG_CHANNEL, LogBuffer, LogEntry, MAX_LOG_LINE_LEN, RecorderHealth};
use dog_core::local_warn;

const BUFFER_SIZE: usize = 4096;

pub struct Recorder<W: Write> {
    sink: W,
    buffer: LogBuffer<BUFFER_SIZE>,
    health_interval: Duration,
    last_health_report: Instant,
    entries: usize,
}

impl<W: Write> Recorder<W> {
    /// Starts a log: the schema lines go out first.
    pub fn new(sink: W, health_interval: Duration) -> Self {
        let mut recorder = Self {
            sink,
            buffer: LogBuffer::new(),
            health_interval,
            last_health_report: Instant::now(),
            entries: 0,
        };
        if LogEntry::write_schema(&mut recorder.buffer).is_err() {
            local_warn!("recorder: schema does not fit the buffer");
        }
        recorder
    }

    /// Moves everything pending on the channel into the sink.
    pub fn poll(&mut self) -> io::Result<()> {
        while let Ok(entry) = LOG_CHANNEL.try_receive() {
            self.buffer_entry(&entry)?;
        }
        if self.last_health_report.elapsed() >= self.health_interval {
            self.health_report()?;
        }
        self.flush()
    }

    pub fn health_report(&mut self) -> io::Result<()> {
        let health = RecorderHealth::capture(embassy_time::Instant::now());
        self.buffer_entry(&LogEntry::RecorderHealth(health))?;
        self.last_health_report = Instant::now();
        Ok(())
    }

    fn buffer_entry(&mut self, entry: &LogEntry) -> io::Result<()> {
        if self.buffer.space_remaining() < MAX_LOG_LINE_LEN {
            self.flush()?;
        }
        match self.buffer.write_entry(entry) {
            Ok(_) => self.entries += 1,
            Err(_) => {
                local_warn!("recorder: entry too long, dropped");
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if self.buffer.pos > 0 {
            self.sink.write_all(self.buffer.get_active_buffer())?;
            self.buffer.reset();
        }
        self.sink.flush()
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Final health line, flushed, and the sink back.
    pub fn finish(mut self) -> io::Result<W> {
        while let Ok(entry) = LOG_CHANNEL.try_receive() {
            self.buffer_entry(&entry)?;
        }
        self.health_report()?;
        self.flush()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dog_core::log::record;

    #[test]
    fn test_schema_then_entries() {
        let mut recorder = Recorder::new(Vec::new(), Duration::from_secs(3600));
        // The channel is global; only look for our own line.
        record(LogEntry::Event(7, "recorder test"));
        recorder.poll().unwrap();
        let out = String::from_utf8(recorder.finish().unwrap()).unwrap();

        assert!(out.starts_with("# SCHEMA DEFINITION\n"));
        assert!(out.lines().any(|line| line == "E,7,recorder test"));
        assert!(out.lines().last().unwrap().starts_with("RH,"));
    }
}
