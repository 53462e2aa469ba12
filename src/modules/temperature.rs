//! On-die temperature sensor.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::require;

pub const VALUE: u8 = 0x01;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::TEMPERATURE,
    name: "temperature",
    registers: &[
        INFO,
        RegisterSpec::new(VALUE, "VALUE")
            .write(Arity::Unsupported)
            .read(Arity::Between(0, 1))
            .decode(decode_value),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureEvent {
    pub celsius: f32,
}

// Big-endian, quarter-degree resolution.
fn decode_value(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 4)?;
    let raw = i16::from_be_bytes([data[2], data[3]]);
    Ok(Some(ModuleEvent::Temperature(TemperatureEvent {
        celsius: raw as f32 / 4.0,
    })))
}

/// Temperature controller.
pub struct Temperature<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Temperature<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    pub fn read(&mut self) -> Result<()> {
        self.sink.read_register(module_id::TEMPERATURE, VALUE, &[])
    }
}

pub trait TemperatureListener: Send {
    fn received_temperature(&mut self, celsius: f32, ctx: &mut DispatchContext<'_>);
}

pub struct TemperatureAdapter<L>(pub L);

impl<L: TemperatureListener> Listener for TemperatureAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        if let ModuleEvent::Temperature(t) = event {
            self.0.received_temperature(t.celsius, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::{decode, deliver, Sink};
    use crate::modules::ModuleControllers;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_read_and_decode_25_degrees() {
        let mut sink = Sink::new();
        sink.temperature().read().unwrap();
        assert_eq!(sink.sent, vec![vec![0x04, 0x81]]);

        assert_eq!(
            decode(&[0x04, 0x81, 0x00, 0x64]),
            Some(ModuleEvent::Temperature(TemperatureEvent { celsius: 25.0 }))
        );
    }

    #[test]
    fn test_negative_temperature() {
        // -10.25 * 4 = -41 = 0xFFD7
        assert_eq!(
            decode(&[0x04, 0x81, 0xFF, 0xD7]),
            Some(ModuleEvent::Temperature(TemperatureEvent { celsius: -10.25 }))
        );
    }

    #[test]
    fn test_listener() {
        struct Last(Arc<Mutex<Option<f32>>>);
        impl TemperatureListener for Last {
            fn received_temperature(&mut self, celsius: f32, _ctx: &mut DispatchContext<'_>) {
                *self.0.lock().unwrap() = Some(celsius);
            }
        }

        let last = Arc::new(Mutex::new(None));
        deliver(
            module_id::TEMPERATURE,
            Box::new(TemperatureAdapter(Last(last.clone()))),
            &[0x04, 0x81, 0x00, 0x64],
        );
        assert_eq!(*last.lock().unwrap(), Some(25.0));
    }
}
