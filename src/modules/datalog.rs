//! On-board data logger.
//!
//! A trigger names a data source and a byte window of it. Every time the
//! source fires, the window is stored with a tick timestamp. Readout
//! streams stored entries back through `READOUT_NOTIFY`, packed
//! [`LogEntry::LEN`] bytes each.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::modules::dataproc::DataSource;
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{is_read_response, require, u16_le, u32_le, PAYLOAD_OFFSET};

pub const ENABLE: u8 = 0x01;
pub const TRIGGER: u8 = 0x02;
pub const REMOVE: u8 = 0x03;
pub const TIME: u8 = 0x04;
pub const LENGTH: u8 = 0x05;
pub const READOUT: u8 = 0x06;
pub const READOUT_NOTIFY: u8 = 0x07;
pub const READOUT_PROGRESS: u8 = 0x08;
pub const REMOVE_ENTRIES: u8 = 0x09;
pub const CIRCULAR_BUFFER: u8 = 0x0b;

/// Milliseconds per logger tick.
pub const TICK_MS: f64 = 48.0 / 32768.0 * 1000.0;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::LOGGING,
    name: "logging",
    registers: &[
        INFO,
        RegisterSpec::new(ENABLE, "ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(TRIGGER, "TRIGGER")
            .write(Arity::Exact(4))
            .read(Arity::Exact(1))
            .decode(decode_trigger),
        RegisterSpec::new(REMOVE, "REMOVE").write(Arity::Exact(1)),
        RegisterSpec::new(TIME, "TIME")
            .write(Arity::Unsupported)
            .read(Arity::Exact(0))
            .decode(decode_time),
        RegisterSpec::new(LENGTH, "LENGTH")
            .write(Arity::Unsupported)
            .read(Arity::Exact(0))
            .decode(decode_length),
        RegisterSpec::new(READOUT, "READOUT").write(Arity::Exact(4)),
        RegisterSpec::new(READOUT_NOTIFY, "READOUT_NOTIFY")
            .write(Arity::Exact(1))
            .decode(decode_readout),
        RegisterSpec::new(READOUT_PROGRESS, "READOUT_PROGRESS")
            .write(Arity::Exact(1))
            .decode(decode_progress),
        RegisterSpec::new(REMOVE_ENTRIES, "REMOVE_ENTRIES").write(Arity::Exact(4)),
        RegisterSpec::new(CIRCULAR_BUFFER, "CIRCULAR_BUFFER").write(Arity::Exact(1)),
    ],
};

/// One stored sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub trigger: u8,
    pub tick: u32,
    pub data: [u8; 4],
}

impl LogEntry {
    pub const LEN: usize = 9;

    fn parse(chunk: &[u8]) -> Self {
        let mut data = [0u8; 4];
        data.copy_from_slice(&chunk[5..9]);
        Self {
            trigger: chunk[0] & 0x1f,
            tick: u32_le(chunk, 1),
            data,
        }
    }

    /// Milliseconds since the logger's tick counter started.
    pub fn offset_ms(&self) -> f64 {
        self.tick as f64 * TICK_MS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoggingEvent {
    TriggerCreated { id: u8 },
    TriggerConfig { source: DataSource },
    Time { tick: u32 },
    EntryCount(u32),
    Entries(Vec<LogEntry>),
    ReadoutProgress { remaining: u32 },
}

fn event(e: LoggingEvent) -> Result<Option<ModuleEvent>, DecodeError> {
    Ok(Some(ModuleEvent::Logging(e)))
}

fn decode_trigger(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    if is_read_response(data) {
        event(LoggingEvent::TriggerConfig {
            source: DataSource::from_bytes(data, PAYLOAD_OFFSET)?,
        })
    } else {
        require(data, 3)?;
        event(LoggingEvent::TriggerCreated { id: data[2] })
    }
}

fn decode_time(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET + 4)?;
    event(LoggingEvent::Time {
        tick: u32_le(data, 2),
    })
}

/// Older firmware reports counts as u16.
fn count(data: &[u8]) -> Result<u32, DecodeError> {
    if data.len() >= PAYLOAD_OFFSET + 4 {
        Ok(u32_le(data, 2))
    } else {
        require(data, PAYLOAD_OFFSET + 2)?;
        Ok(u16_le(data, 2) as u32)
    }
}

fn decode_length(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    event(LoggingEvent::EntryCount(count(data)?))
}

fn decode_progress(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    event(LoggingEvent::ReadoutProgress {
        remaining: count(data)?,
    })
}

// Trailing bytes shorter than one entry are padding.
fn decode_readout(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET + LogEntry::LEN)?;
    let entries = data[PAYLOAD_OFFSET..]
        .chunks_exact(LogEntry::LEN)
        .map(LogEntry::parse)
        .collect();
    event(LoggingEvent::Entries(entries))
}

/// Logging controller.
pub struct Logging<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Logging<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    pub fn start(&mut self, overwrite: bool) -> Result<()> {
        self.sink.write_register(module_id::LOGGING, CIRCULAR_BUFFER, &[overwrite as u8])?;
        self.sink.write_register(module_id::LOGGING, ENABLE, &[1])
    }

    pub fn stop(&mut self) -> Result<()> {
        self.sink.write_register(module_id::LOGGING, ENABLE, &[0])
    }

    /// Start logging `source`. The trigger id arrives as
    /// [`LoggingEvent::TriggerCreated`].
    pub fn add_trigger(&mut self, source: DataSource) -> Result<()> {
        self.sink.write_register(module_id::LOGGING, TRIGGER, &source.to_bytes())
    }

    pub fn read_trigger(&mut self, id: u8) -> Result<()> {
        self.sink.read_register(module_id::LOGGING, TRIGGER, &[id])
    }

    pub fn remove_trigger(&mut self, id: u8) -> Result<()> {
        self.sink.write_register(module_id::LOGGING, REMOVE, &[id])
    }

    pub fn read_reference_tick(&mut self) -> Result<()> {
        self.sink.read_register(module_id::LOGGING, TIME, &[])
    }

    pub fn read_entry_count(&mut self) -> Result<()> {
        self.sink.read_register(module_id::LOGGING, LENGTH, &[])
    }

    /// Stream up to `count` entries, with progress notifications enabled.
    pub fn download(&mut self, count: u32) -> Result<()> {
        self.sink.write_register(module_id::LOGGING, READOUT_NOTIFY, &[1])?;
        self.sink.write_register(module_id::LOGGING, READOUT_PROGRESS, &[1])?;
        self.sink.write_register(module_id::LOGGING, READOUT, &count.to_le_bytes())
    }

    pub fn remove_entries(&mut self, count: u32) -> Result<()> {
        self.sink.write_register(module_id::LOGGING, REMOVE_ENTRIES, &count.to_le_bytes())
    }
}

pub trait LoggingListener: Send {
    fn received_trigger_id(&mut self, _id: u8, _ctx: &mut DispatchContext<'_>) {}
    fn received_trigger_config(&mut self, _source: DataSource, _ctx: &mut DispatchContext<'_>) {}
    fn received_reference_tick(&mut self, _tick: u32, _ctx: &mut DispatchContext<'_>) {}
    fn received_entry_count(&mut self, _count: u32, _ctx: &mut DispatchContext<'_>) {}
    fn received_log_entry(&mut self, _entry: LogEntry, _ctx: &mut DispatchContext<'_>) {}
    fn received_download_progress(&mut self, _remaining: u32, _ctx: &mut DispatchContext<'_>) {}
}

pub struct LoggingAdapter<L>(pub L);

impl<L: LoggingListener> Listener for LoggingAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        let ModuleEvent::Logging(event) = event else {
            return;
        };
        match event {
            LoggingEvent::TriggerCreated { id } => self.0.received_trigger_id(*id, ctx),
            LoggingEvent::TriggerConfig { source } => self.0.received_trigger_config(*source, ctx),
            LoggingEvent::Time { tick } => self.0.received_reference_tick(*tick, ctx),
            LoggingEvent::EntryCount(count) => self.0.received_entry_count(*count, ctx),
            LoggingEvent::Entries(entries) => {
                for entry in entries {
                    self.0.received_log_entry(*entry, ctx);
                }
            }
            LoggingEvent::ReadoutProgress { remaining } => {
                self.0.received_download_progress(*remaining, ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::{decode, deliver, Sink};
    use crate::modules::{temperature, ModuleControllers};
    use crate::protocol::wire::SourceDescriptor;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_trigger_two_shapes() {
        assert_eq!(
            decode(&[0x0b, 0x02, 0x03]),
            Some(ModuleEvent::Logging(LoggingEvent::TriggerCreated { id: 3 }))
        );
        assert_eq!(
            decode(&[0x0b, 0x82, 0x04, 0x81, 0x00, 0x20]),
            Some(ModuleEvent::Logging(LoggingEvent::TriggerConfig {
                source: DataSource {
                    descriptor: SourceDescriptor::new(0x04, 0x81, 0x00),
                    offset: 0,
                    length: 2
                }
            }))
        );
    }

    #[test]
    fn test_readout_packs_two_entries() {
        let buf = [
            0x0b, 0x07, //
            0x21, 0x10, 0x00, 0x00, 0x00, 0xaa, 0xbb, 0x00, 0x00, //
            0x02, 0x20, 0x00, 0x00, 0x00, 0xcc, 0xdd, 0x00, 0x00,
        ];
        match decode(&buf) {
            Some(ModuleEvent::Logging(LoggingEvent::Entries(entries))) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].trigger, 1);
                assert_eq!(entries[0].tick, 0x10);
                assert_eq!(entries[0].data, [0xaa, 0xbb, 0, 0]);
                assert_eq!(entries[1].trigger, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_entry_count_shapes() {
        assert_eq!(
            decode(&[0x0b, 0x85, 0x10, 0x27]),
            Some(ModuleEvent::Logging(LoggingEvent::EntryCount(10_000)))
        );
        assert_eq!(
            decode(&[0x0b, 0x85, 0xa0, 0x86, 0x01, 0x00]),
            Some(ModuleEvent::Logging(LoggingEvent::EntryCount(100_000)))
        );
    }

    #[test]
    fn test_download_sequence() {
        let mut sink = Sink::new();
        sink.logging().download(100).unwrap();
        assert_eq!(
            sink.sent,
            vec![
                vec![0x0b, 0x07, 0x01],
                vec![0x0b, 0x08, 0x01],
                vec![0x0b, 0x06, 100, 0, 0, 0],
            ]
        );
    }

    #[test]
    fn test_add_trigger() {
        let mut sink = Sink::new();
        let source = DataSource {
            descriptor: SourceDescriptor::new(module_id::TEMPERATURE, temperature::VALUE | 0x80, 0x00),
            offset: 0,
            length: 2,
        };
        sink.logging().add_trigger(source).unwrap();
        assert_eq!(sink.sent, vec![vec![0x0b, 0x02, 0x04, 0x81, 0x00, 0x20]]);
    }

    #[test]
    fn test_adapter_splits_entries() {
        struct Count(Arc<Mutex<usize>>);
        impl LoggingListener for Count {
            fn received_log_entry(&mut self, _entry: LogEntry, _ctx: &mut DispatchContext<'_>) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let n = Arc::new(Mutex::new(0));
        let mut buf = vec![0x0b, 0x07];
        buf.extend_from_slice(&[0u8; 18]);
        deliver(module_id::LOGGING, Box::new(LoggingAdapter(Count(n.clone()))), &buf);
        assert_eq!(*n.lock().unwrap(), 2);
    }
}
