//! RGB status LED.
//!
//! Each colour channel runs its own pulse pattern. Patterns are written with
//! [`Led::configure_channel`] and take effect after [`Led::play`].

use super::{module_id, CommandSink, INFO};
use crate::error::Result;
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};

pub const PLAY: u8 = 0x01;
pub const STOP: u8 = 0x02;
pub const MODE: u8 = 0x03;

/// Pattern type byte for a flashing pattern.
const MODE_FLASH: u8 = 0x02;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::LED,
    name: "led",
    registers: &[
        INFO,
        RegisterSpec::new(PLAY, "PLAY").write(Arity::Exact(1)),
        RegisterSpec::new(STOP, "STOP").write(Arity::Exact(1)),
        RegisterSpec::new(MODE, "MODE").write(Arity::Exact(15)),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Green = 0,
    Red = 1,
    Blue = 2,
}

/// LED controller.
pub struct Led<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Led<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Start the configured patterns. With `autoplay` set, patterns written
    /// later start immediately.
    pub fn play(&mut self, autoplay: bool) -> Result<()> {
        self.sink.write_register(module_id::LED, PLAY, &[autoplay as u8 + 1])
    }

    /// Pause playback.
    pub fn pause(&mut self) -> Result<()> {
        self.sink.write_register(module_id::LED, PLAY, &[0])
    }

    /// Stop playback, optionally erasing the stored patterns.
    pub fn stop(&mut self, clear: bool) -> Result<()> {
        self.sink.write_register(module_id::LED, STOP, &[clear as u8])
    }

    /// Edit the pattern of one colour channel. Nothing is sent until
    /// [`LedPatternEditor::commit`].
    pub fn configure_channel(&mut self, channel: ColorChannel) -> LedPatternEditor<'_, S> {
        LedPatternEditor {
            sink: &mut *self.sink,
            config: [
                channel as u8,
                MODE_FLASH,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
            ],
        }
    }
}

/// Builds the 15-byte pattern config:
///
/// ```text
/// [0]      channel
/// [1]      pattern type
/// [2], [3] high and low intensity (0..=31)
/// [4..14]  rise, high, fall, pulse duration, delay (u16 LE, ms)
/// [14]     repeat count, 0xff repeats forever
/// ```
pub struct LedPatternEditor<'a, S: ?Sized> {
    sink: &'a mut S,
    config: [u8; 15],
}

impl<'a, S: CommandSink + ?Sized> LedPatternEditor<'a, S> {
    pub fn high_intensity(mut self, intensity: u8) -> Self {
        self.config[2] = intensity.min(31);
        self
    }

    pub fn low_intensity(mut self, intensity: u8) -> Self {
        self.config[3] = intensity.min(31);
        self
    }

    pub fn rise_time(self, ms: u16) -> Self {
        self.set_u16(4, ms)
    }

    pub fn high_time(self, ms: u16) -> Self {
        self.set_u16(6, ms)
    }

    pub fn fall_time(self, ms: u16) -> Self {
        self.set_u16(8, ms)
    }

    pub fn pulse_duration(self, ms: u16) -> Self {
        self.set_u16(10, ms)
    }

    pub fn delay(self, ms: u16) -> Self {
        self.set_u16(12, ms)
    }

    pub fn repeat_count(mut self, count: u8) -> Self {
        self.config[14] = count;
        self
    }

    fn set_u16(mut self, offset: usize, value: u16) -> Self {
        self.config[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        self
    }

    pub fn commit(self) -> Result<()> {
        self.sink.write_register(module_id::LED, MODE, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::Sink;
    use crate::modules::ModuleControllers;

    #[test]
    fn test_pattern_commit() {
        let mut sink = Sink::new();
        sink.led()
            .configure_channel(ColorChannel::Blue)
            .high_intensity(31)
            .low_intensity(0)
            .rise_time(0)
            .high_time(500)
            .fall_time(0)
            .pulse_duration(1000)
            .repeat_count(10)
            .commit()
            .unwrap();

        assert_eq!(
            sink.sent,
            vec![vec![
                0x02, 0x03, 0x02, 0x02, 31, 0, 0, 0, 0xf4, 0x01, 0, 0, 0xe8, 0x03, 0, 0, 10
            ]]
        );
    }

    #[test]
    fn test_editor_sends_nothing_until_commit() {
        let mut sink = Sink::new();
        let _ = sink
            .led()
            .configure_channel(ColorChannel::Red)
            .high_intensity(40);
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn test_play_and_stop() {
        let mut sink = Sink::new();
        sink.led().play(false).unwrap();
        sink.led().stop(true).unwrap();
        assert_eq!(sink.sent, vec![vec![0x02, 0x01, 0x01], vec![0x02, 0x02, 0x01]]);
    }
}
