//! Periodic timers. Combine with the event module to run commands on a
//! schedule.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{is_read_response, require, u16_le, u32_le, PAYLOAD_OFFSET};

pub const ENABLE: u8 = 0x01;
pub const ENTRY: u8 = 0x02;
pub const START: u8 = 0x03;
pub const STOP: u8 = 0x04;
pub const REMOVE: u8 = 0x05;
pub const NOTIFY: u8 = 0x06;
pub const NOTIFY_ENABLE: u8 = 0x07;

/// Repeat count meaning "until stopped".
pub const REPEAT_FOREVER: u16 = 0xffff;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::TIMER,
    name: "timer",
    registers: &[
        INFO,
        RegisterSpec::new(ENABLE, "ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(ENTRY, "ENTRY")
            .write(Arity::Exact(7))
            .read(Arity::Exact(1))
            .decode(decode_entry),
        RegisterSpec::new(START, "START").write(Arity::Exact(1)),
        RegisterSpec::new(STOP, "STOP").write(Arity::Exact(1)),
        RegisterSpec::new(REMOVE, "REMOVE").write(Arity::Exact(1)),
        RegisterSpec::new(NOTIFY, "NOTIFY")
            .write(Arity::Unsupported)
            .decode(decode_notify),
        RegisterSpec::new(NOTIFY_ENABLE, "NOTIFY_ENABLE").write(Arity::Exact(2)),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerConfig {
    pub period_ms: u32,
    pub repeat: u16,
    pub delay: bool,
}

impl TimerConfig {
    fn to_bytes(self) -> [u8; 7] {
        let p = self.period_ms.to_le_bytes();
        let r = self.repeat.to_le_bytes();
        [p[0], p[1], p[2], p[3], r[0], r[1], (!self.delay) as u8]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimerEvent {
    Created { id: u8 },
    Config { id: u8, config: TimerConfig },
    Fired { id: u8 },
}

// Byte 6 of the config is "fire immediately", the inverse of delay.
fn decode_entry(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let event = if is_read_response(data) {
        require(data, PAYLOAD_OFFSET + 8)?;
        TimerEvent::Config {
            id: data[2],
            config: TimerConfig {
                period_ms: u32_le(data, 3),
                repeat: u16_le(data, 7),
                delay: data[9] == 0,
            },
        }
    } else {
        require(data, 3)?;
        TimerEvent::Created { id: data[2] }
    };
    Ok(Some(ModuleEvent::Timer(event)))
}

fn decode_notify(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    Ok(Some(ModuleEvent::Timer(TimerEvent::Fired { id: data[2] })))
}

/// Timer controller.
pub struct Timer<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Timer<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Create a timer; its id arrives as [`TimerEvent::Created`].
    pub fn schedule(&mut self, config: TimerConfig) -> Result<()> {
        self.sink.write_register(module_id::TIMER, ENTRY, &config.to_bytes())
    }

    pub fn read_config(&mut self, id: u8) -> Result<()> {
        self.sink.read_register(module_id::TIMER, ENTRY, &[id])
    }

    pub fn start(&mut self, id: u8) -> Result<()> {
        self.sink.write_register(module_id::TIMER, START, &[id])
    }

    pub fn stop(&mut self, id: u8) -> Result<()> {
        self.sink.write_register(module_id::TIMER, STOP, &[id])
    }

    pub fn remove(&mut self, id: u8) -> Result<()> {
        self.sink.write_register(module_id::TIMER, REMOVE, &[id])
    }

    pub fn enable_notifications(&mut self, id: u8, enable: bool) -> Result<()> {
        self.sink.write_register(module_id::TIMER, NOTIFY_ENABLE, &[id, enable as u8])
    }
}

pub trait TimerListener: Send {
    fn received_timer_id(&mut self, _id: u8, _ctx: &mut DispatchContext<'_>) {}
    fn received_timer_config(&mut self, _id: u8, _config: TimerConfig, _ctx: &mut DispatchContext<'_>) {}
    fn timer_fired(&mut self, _id: u8, _ctx: &mut DispatchContext<'_>) {}
}

pub struct TimerAdapter<L>(pub L);

impl<L: TimerListener> Listener for TimerAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        match event {
            ModuleEvent::Timer(TimerEvent::Created { id }) => self.0.received_timer_id(*id, ctx),
            ModuleEvent::Timer(TimerEvent::Config { id, config }) => {
                self.0.received_timer_config(*id, *config, ctx)
            }
            ModuleEvent::Timer(TimerEvent::Fired { id }) => self.0.timer_fired(*id, ctx),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::{decode, Sink};
    use crate::modules::ModuleControllers;

    #[test]
    fn test_schedule_layout() {
        let mut sink = Sink::new();
        sink.timer()
            .schedule(TimerConfig {
                period_ms: 1000,
                repeat: REPEAT_FOREVER,
                delay: false,
            })
            .unwrap();
        assert_eq!(
            sink.sent,
            vec![vec![0x0c, 0x02, 0xe8, 0x03, 0x00, 0x00, 0xff, 0xff, 0x01]]
        );
    }

    #[test]
    fn test_entry_two_shapes() {
        assert_eq!(
            decode(&[0x0c, 0x02, 0x00]),
            Some(ModuleEvent::Timer(TimerEvent::Created { id: 0 }))
        );
        assert_eq!(
            decode(&[0x0c, 0x82, 0x00, 0xe8, 0x03, 0x00, 0x00, 0x0a, 0x00, 0x00]),
            Some(ModuleEvent::Timer(TimerEvent::Config {
                id: 0,
                config: TimerConfig {
                    period_ms: 1000,
                    repeat: 10,
                    delay: true
                }
            }))
        );
    }

    #[test]
    fn test_fired() {
        assert_eq!(
            decode(&[0x0c, 0x06, 0x02]),
            Some(ModuleEvent::Timer(TimerEvent::Fired { id: 2 }))
        );
    }
}
