//! Mechanical push button.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::require;

pub const STATE: u8 = 0x01;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::SWITCH,
    name: "switch",
    registers: &[
        INFO,
        RegisterSpec::new(STATE, "STATE")
            .write(Arity::Exact(1))
            .read(Arity::Exact(0))
            .decode(decode_state),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwitchEvent {
    Pressed,
    Released,
}

fn decode_state(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    let event = if data[2] == 0 {
        SwitchEvent::Released
    } else {
        SwitchEvent::Pressed
    };
    Ok(Some(ModuleEvent::Switch(event)))
}

/// Switch controller.
pub struct Switch<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Switch<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Turn state notifications on or off.
    pub fn enable_notifications(&mut self, enable: bool) -> Result<()> {
        self.sink.write_register(module_id::SWITCH, STATE, &[enable as u8])
    }

    /// Read the current state once.
    pub fn read_state(&mut self) -> Result<()> {
        self.sink.read_register(module_id::SWITCH, STATE, &[])
    }
}

/// Callbacks for switch events. Both default to no-ops.
pub trait SwitchListener: Send {
    fn pressed(&mut self, _ctx: &mut DispatchContext<'_>) {}
    fn released(&mut self, _ctx: &mut DispatchContext<'_>) {}
}

/// Wraps a [`SwitchListener`] for registration on the switch module.
pub struct SwitchAdapter<L>(pub L);

impl<L: SwitchListener> Listener for SwitchAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        match event {
            ModuleEvent::Switch(SwitchEvent::Pressed) => self.0.pressed(ctx),
            ModuleEvent::Switch(SwitchEvent::Released) => self.0.released(ctx),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::{deliver, Sink};
    use crate::modules::ModuleControllers;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl SwitchListener for Recorder {
        fn pressed(&mut self, _ctx: &mut DispatchContext<'_>) {
            self.0.lock().unwrap().push("pressed");
        }
        fn released(&mut self, _ctx: &mut DispatchContext<'_>) {
            self.0.lock().unwrap().push("released");
        }
    }

    #[test]
    fn test_press_and_release() {
        let log = Arc::new(Mutex::new(Vec::new()));
        deliver(
            module_id::SWITCH,
            Box::new(SwitchAdapter(Recorder(log.clone()))),
            &[0x01, 0x01, 0x01],
        );
        deliver(
            module_id::SWITCH,
            Box::new(SwitchAdapter(Recorder(log.clone()))),
            &[0x01, 0x01, 0x00],
        );
        assert_eq!(*log.lock().unwrap(), vec!["pressed", "released"]);
    }

    #[test]
    fn test_commands() {
        let mut sink = Sink::new();
        sink.switch().enable_notifications(true).unwrap();
        sink.switch().read_state().unwrap();
        assert_eq!(sink.sent, vec![vec![0x01, 0x01, 0x01], vec![0x01, 0x81]]);
    }
}
