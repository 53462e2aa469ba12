//! Haptic / buzzer driver.

use super::{module_id, CommandSink, INFO};
use crate::error::Result;
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};

pub const PULSE: u8 = 0x01;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::HAPTIC,
    name: "haptic",
    registers: &[INFO, RegisterSpec::new(PULSE, "PULSE").write(Arity::Exact(4))],
};

/// Full duty cycle for the buzzer.
const BUZZER_DUTY_CYCLE: u8 = 127;

/// Haptic controller.
pub struct Haptic<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Haptic<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Drive the motor at `strength` percent for `width_ms`.
    pub fn start_motor(&mut self, strength: f32, width_ms: u16) -> Result<()> {
        let duty = (strength.clamp(0.0, 100.0) / 100.0 * 248.0) as u8;
        self.pulse(duty, width_ms, 0)
    }

    pub fn start_buzzer(&mut self, width_ms: u16) -> Result<()> {
        self.pulse(BUZZER_DUTY_CYCLE, width_ms, 1)
    }

    fn pulse(&mut self, duty: u8, width_ms: u16, kind: u8) -> Result<()> {
        let [lo, hi] = width_ms.to_le_bytes();
        self.sink.write_register(module_id::HAPTIC, PULSE, &[duty, lo, hi, kind])
    }
}
