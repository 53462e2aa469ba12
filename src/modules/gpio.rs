//! General purpose I/O pins.
//!
//! Read responses and pin-change notifications come in two wire shapes.
//! Older firmware sends only the value; newer firmware prefixes it with the
//! pin index. The decoders pick the shape from the payload length.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{require, u16_le, PAYLOAD_OFFSET};

pub const SET_DO: u8 = 0x01;
pub const CLEAR_DO: u8 = 0x02;
pub const PULL_UP: u8 = 0x03;
pub const PULL_DOWN: u8 = 0x04;
pub const NO_PULL: u8 = 0x05;
pub const READ_AI_ABS_REF: u8 = 0x06;
pub const READ_AI_ADC: u8 = 0x07;
pub const READ_DI: u8 = 0x08;
pub const PIN_CHANGE: u8 = 0x09;
pub const PIN_CHANGE_NOTIFY: u8 = 0x0a;
pub const PIN_CHANGE_NOTIFY_ENABLE: u8 = 0x0b;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::GPIO,
    name: "gpio",
    registers: &[
        INFO,
        RegisterSpec::new(SET_DO, "SET_DO").write(Arity::Exact(1)),
        RegisterSpec::new(CLEAR_DO, "CLEAR_DO").write(Arity::Exact(1)),
        RegisterSpec::new(PULL_UP, "PULL_UP").write(Arity::Exact(1)),
        RegisterSpec::new(PULL_DOWN, "PULL_DOWN").write(Arity::Exact(1)),
        RegisterSpec::new(NO_PULL, "NO_PULL").write(Arity::Exact(1)),
        RegisterSpec::new(READ_AI_ABS_REF, "READ_AI_ABS_REF")
            .write(Arity::Unsupported)
            .read(Arity::Exact(1))
            .decode(decode_analog_abs_ref),
        RegisterSpec::new(READ_AI_ADC, "READ_AI_ADC")
            .write(Arity::Unsupported)
            .read(Arity::Exact(1))
            .decode(decode_analog_adc),
        RegisterSpec::new(READ_DI, "READ_DI")
            .write(Arity::Unsupported)
            .read(Arity::Exact(1))
            .decode(decode_digital),
        RegisterSpec::new(PIN_CHANGE, "PIN_CHANGE")
            .write(Arity::Exact(2))
            .read(Arity::Exact(1)),
        RegisterSpec::new(PIN_CHANGE_NOTIFY, "PIN_CHANGE_NOTIFY")
            .write(Arity::Unsupported)
            .decode(decode_pin_change),
        RegisterSpec::new(PIN_CHANGE_NOTIFY_ENABLE, "PIN_CHANGE_NOTIFY_ENABLE")
            .write(Arity::Exact(2)),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    Up,
    Down,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogReadMode {
    /// Millivolts against the absolute reference.
    AbsoluteReference,
    /// Raw ADC value, ratio against supply.
    SupplyRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinChangeType {
    Rising = 1,
    Falling = 2,
    Any = 3,
}

/// `pin` is `None` when the board uses the legacy single-field shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GpioEvent {
    DigitalInput { pin: Option<u8>, value: u8 },
    AnalogAbsolute { pin: Option<u8>, millivolts: u16 },
    AnalogRatio { pin: Option<u8>, value: u16 },
    PinChanged { pin: Option<u8>, high: bool },
}

/// Split a payload of `width` value bytes into (pin, value offset).
fn shape(data: &[u8], width: usize) -> Result<(Option<u8>, usize), DecodeError> {
    require(data, PAYLOAD_OFFSET + width)?;
    if data.len() > PAYLOAD_OFFSET + width {
        Ok((Some(data[PAYLOAD_OFFSET]), PAYLOAD_OFFSET + 1))
    } else {
        Ok((None, PAYLOAD_OFFSET))
    }
}

fn decode_digital(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let (pin, at) = shape(data, 1)?;
    Ok(Some(ModuleEvent::Gpio(GpioEvent::DigitalInput {
        pin,
        value: data[at],
    })))
}

fn decode_analog_abs_ref(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let (pin, at) = shape(data, 2)?;
    Ok(Some(ModuleEvent::Gpio(GpioEvent::AnalogAbsolute {
        pin,
        millivolts: u16_le(data, at),
    })))
}

fn decode_analog_adc(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let (pin, at) = shape(data, 2)?;
    Ok(Some(ModuleEvent::Gpio(GpioEvent::AnalogRatio {
        pin,
        value: u16_le(data, at),
    })))
}

fn decode_pin_change(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let (pin, at) = shape(data, 1)?;
    Ok(Some(ModuleEvent::Gpio(GpioEvent::PinChanged {
        pin,
        high: data[at] != 0,
    })))
}

/// GPIO controller.
pub struct Gpio<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Gpio<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    pub fn set_digital_output(&mut self, pin: u8) -> Result<()> {
        self.sink.write_register(module_id::GPIO, SET_DO, &[pin])
    }

    pub fn clear_digital_output(&mut self, pin: u8) -> Result<()> {
        self.sink.write_register(module_id::GPIO, CLEAR_DO, &[pin])
    }

    pub fn set_pull_mode(&mut self, pin: u8, mode: PullMode) -> Result<()> {
        let register = match mode {
            PullMode::Up => PULL_UP,
            PullMode::Down => PULL_DOWN,
            PullMode::None => NO_PULL,
        };
        self.sink.write_register(module_id::GPIO, register, &[pin])
    }

    pub fn read_digital_input(&mut self, pin: u8) -> Result<()> {
        self.sink.read_register(module_id::GPIO, READ_DI, &[pin])
    }

    pub fn read_analog_input(&mut self, pin: u8, mode: AnalogReadMode) -> Result<()> {
        let register = match mode {
            AnalogReadMode::AbsoluteReference => READ_AI_ABS_REF,
            AnalogReadMode::SupplyRatio => READ_AI_ADC,
        };
        self.sink.read_register(module_id::GPIO, register, &[pin])
    }

    pub fn set_pin_change_type(&mut self, pin: u8, kind: PinChangeType) -> Result<()> {
        self.sink.write_register(module_id::GPIO, PIN_CHANGE, &[pin, kind as u8])
    }

    pub fn enable_pin_change_notification(&mut self, pin: u8, enable: bool) -> Result<()> {
        self.sink.write_register(
            module_id::GPIO,
            PIN_CHANGE_NOTIFY_ENABLE,
            &[pin, enable as u8],
        )
    }
}

/// Callbacks for GPIO events. All default to no-ops.
///
/// The value-only callbacks are invoked for every event. The pin-aware ones
/// are invoked in addition when the board reported the pin.
pub trait GpioListener: Send {
    fn received_digital_input(&mut self, _value: u8, _ctx: &mut DispatchContext<'_>) {}
    fn received_pin_digital_input(&mut self, _pin: u8, _value: u8, _ctx: &mut DispatchContext<'_>) {}

    fn received_analog_input_abs_ref(&mut self, _millivolts: u16, _ctx: &mut DispatchContext<'_>) {}
    fn received_pin_analog_input_abs_ref(
        &mut self,
        _pin: u8,
        _millivolts: u16,
        _ctx: &mut DispatchContext<'_>,
    ) {
    }

    fn received_analog_input_supply_ratio(&mut self, _value: u16, _ctx: &mut DispatchContext<'_>) {}
    fn received_pin_analog_input_supply_ratio(
        &mut self,
        _pin: u8,
        _value: u16,
        _ctx: &mut DispatchContext<'_>,
    ) {
    }

    fn pin_change_detected(&mut self, _high: bool, _ctx: &mut DispatchContext<'_>) {}
    fn pin_change_detected_on(&mut self, _pin: u8, _high: bool, _ctx: &mut DispatchContext<'_>) {}
}

pub struct GpioAdapter<L>(pub L);

impl<L: GpioListener> Listener for GpioAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        let ModuleEvent::Gpio(event) = event else {
            return;
        };
        let l = &mut self.0;
        match *event {
            GpioEvent::DigitalInput { pin, value } => {
                if let Some(pin) = pin {
                    l.received_pin_digital_input(pin, value, ctx);
                }
                l.received_digital_input(value, ctx);
            }
            GpioEvent::AnalogAbsolute { pin, millivolts } => {
                if let Some(pin) = pin {
                    l.received_pin_analog_input_abs_ref(pin, millivolts, ctx);
                }
                l.received_analog_input_abs_ref(millivolts, ctx);
            }
            GpioEvent::AnalogRatio { pin, value } => {
                if let Some(pin) = pin {
                    l.received_pin_analog_input_supply_ratio(pin, value, ctx);
                }
                l.received_analog_input_supply_ratio(value, ctx);
            }
            GpioEvent::PinChanged { pin, high } => {
                if let Some(pin) = pin {
                    l.pin_change_detected_on(pin, high, ctx);
                }
                l.pin_change_detected(high, ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::{decode, deliver, Sink};
    use crate::modules::ModuleControllers;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        rich: Vec<(u8, u8)>,
        legacy: Vec<u8>,
    }

    struct Recorder(Arc<Mutex<Calls>>);

    impl GpioListener for Recorder {
        fn received_digital_input(&mut self, value: u8, _ctx: &mut DispatchContext<'_>) {
            self.0.lock().unwrap().legacy.push(value);
        }
        fn received_pin_digital_input(&mut self, pin: u8, value: u8, _ctx: &mut DispatchContext<'_>) {
            self.0.lock().unwrap().rich.push((pin, value));
        }
    }

    #[test]
    fn test_digital_pin_read_scenario() {
        let mut sink = Sink::new();
        sink.gpio().read_digital_input(3).unwrap();
        assert_eq!(sink.sent, vec![vec![0x05, 0x88, 0x03]]);

        let calls = Arc::new(Mutex::new(Calls::default()));
        deliver(
            module_id::GPIO,
            Box::new(GpioAdapter(Recorder(calls.clone()))),
            &[0x05, 0x88, 0x03, 0x01],
        );
        let calls = calls.lock().unwrap();
        assert_eq!(calls.rich, vec![(3, 1)]);
        assert_eq!(calls.legacy, vec![1]);
    }

    #[test]
    fn test_legacy_shape_skips_rich_callback() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        deliver(
            module_id::GPIO,
            Box::new(GpioAdapter(Recorder(calls.clone()))),
            &[0x05, 0x88, 0x00],
        );
        let calls = calls.lock().unwrap();
        assert!(calls.rich.is_empty());
        assert_eq!(calls.legacy, vec![0]);
    }

    #[test]
    fn test_analog_shapes() {
        assert_eq!(
            decode(&[0x05, 0x86, 0x2c, 0x01]),
            Some(ModuleEvent::Gpio(GpioEvent::AnalogAbsolute {
                pin: None,
                millivolts: 300
            }))
        );
        assert_eq!(
            decode(&[0x05, 0x87, 0x02, 0xff, 0x03]),
            Some(ModuleEvent::Gpio(GpioEvent::AnalogRatio {
                pin: Some(2),
                value: 1023
            }))
        );
    }

    #[test]
    fn test_pin_change_notification() {
        assert_eq!(
            decode(&[0x05, 0x0a, 0x01, 0x01]),
            Some(ModuleEvent::Gpio(GpioEvent::PinChanged {
                pin: Some(1),
                high: true
            }))
        );
    }

    #[test]
    fn test_output_and_pull_commands() {
        let mut sink = Sink::new();
        sink.gpio().set_digital_output(3).unwrap();
        sink.gpio().clear_digital_output(3).unwrap();
        sink.gpio().set_pull_mode(1, PullMode::None).unwrap();
        sink.gpio().set_pin_change_type(1, PinChangeType::Falling).unwrap();
        sink.gpio().enable_pin_change_notification(1, true).unwrap();
        assert_eq!(
            sink.sent,
            vec![
                vec![0x05, 0x01, 0x03],
                vec![0x05, 0x02, 0x03],
                vec![0x05, 0x05, 0x01],
                vec![0x05, 0x09, 0x01, 0x02],
                vec![0x05, 0x0b, 0x01, 0x01],
            ]
        );
    }
}
