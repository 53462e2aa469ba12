//! MMA8452Q 3-axis accelerometer.
//!
//! # Data settings layout
//!
//! ```text
//! [0] : XYZ_DATA_CFG, bits 0-1 full-scale range
//! [1] : HP_FILTER_CUTOFF
//! [2] : CTRL_REG1, bits 3-5 output data rate
//! [3] : CTRL_REG2
//! [4] : CTRL_REG3
//! ```

use serde::Serialize;

use super::{module_id, CommandSink, HasOutputDataRate, HasRange, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{i12_packed, require, PAYLOAD_OFFSET};

pub const GLOBAL_ENABLE: u8 = 0x01;
pub const DATA_ENABLE: u8 = 0x02;
pub const DATA_SETTINGS: u8 = 0x03;
pub const DATA_VALUE: u8 = 0x04;
pub const ORIENTATION_ENABLE: u8 = 0x08;
pub const ORIENTATION_SETTINGS: u8 = 0x09;
pub const ORIENTATION_VALUE: u8 = 0x0a;
pub const SHAKE_ENABLE: u8 = 0x0b;
pub const SHAKE_SETTINGS: u8 = 0x0c;
pub const SHAKE_STATUS: u8 = 0x0d;
pub const TAP_ENABLE: u8 = 0x0e;
pub const TAP_SETTINGS: u8 = 0x0f;
pub const TAP_STATUS: u8 = 0x10;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::ACCELEROMETER,
    name: "accelerometer",
    registers: &[
        INFO,
        RegisterSpec::new(GLOBAL_ENABLE, "GLOBAL_ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(DATA_ENABLE, "DATA_ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(DATA_SETTINGS, "DATA_SETTINGS")
            .write(Arity::Exact(DataSettings::LEN))
            .read(Arity::Exact(0))
            .decode(decode_data_settings),
        RegisterSpec::new(DATA_VALUE, "DATA_VALUE")
            .write(Arity::Unsupported)
            .decode(decode_data_value),
        RegisterSpec::new(ORIENTATION_ENABLE, "ORIENTATION_ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(ORIENTATION_SETTINGS, "ORIENTATION_SETTINGS").read(Arity::Exact(0)),
        RegisterSpec::new(ORIENTATION_VALUE, "ORIENTATION_VALUE")
            .write(Arity::Unsupported)
            .decode(decode_orientation),
        RegisterSpec::new(SHAKE_ENABLE, "SHAKE_ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(SHAKE_SETTINGS, "SHAKE_SETTINGS").read(Arity::Exact(0)),
        RegisterSpec::new(SHAKE_STATUS, "SHAKE_STATUS")
            .write(Arity::Unsupported)
            .decode(decode_shake),
        RegisterSpec::new(TAP_ENABLE, "TAP_ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(TAP_SETTINGS, "TAP_SETTINGS").read(Arity::Exact(0)),
        RegisterSpec::new(TAP_STATUS, "TAP_STATUS")
            .write(Arity::Unsupported)
            .decode(decode_tap),
    ],
};

/// Output data rate, encoded in CTRL_REG1 bits 3-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputDataRate {
    Hz800,
    Hz400,
    Hz200,
    Hz100,
    Hz50,
    Hz12_5,
    Hz6_25,
    Hz1_56,
}

impl OutputDataRate {
    const ALL: [OutputDataRate; 8] = [
        OutputDataRate::Hz800,
        OutputDataRate::Hz400,
        OutputDataRate::Hz200,
        OutputDataRate::Hz100,
        OutputDataRate::Hz50,
        OutputDataRate::Hz12_5,
        OutputDataRate::Hz6_25,
        OutputDataRate::Hz1_56,
    ];

    pub fn hertz(self) -> f32 {
        match self {
            OutputDataRate::Hz800 => 800.0,
            OutputDataRate::Hz400 => 400.0,
            OutputDataRate::Hz200 => 200.0,
            OutputDataRate::Hz100 => 100.0,
            OutputDataRate::Hz50 => 50.0,
            OutputDataRate::Hz12_5 => 12.5,
            OutputDataRate::Hz6_25 => 6.25,
            OutputDataRate::Hz1_56 => 1.56,
        }
    }

    fn bits(self) -> u8 {
        self as u8
    }

    fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 0x07) as usize]
    }
}

/// Full-scale range, encoded in XYZ_DATA_CFG bits 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FullScaleRange {
    G2,
    G4,
    G8,
}

impl FullScaleRange {
    /// Raw 12-bit counts per g.
    pub fn counts_per_g(self) -> f32 {
        match self {
            FullScaleRange::G2 => 1024.0,
            FullScaleRange::G4 => 512.0,
            FullScaleRange::G8 => 256.0,
        }
    }

    fn bits(self) -> u8 {
        self as u8
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => FullScaleRange::G2,
            1 => FullScaleRange::G4,
            _ => FullScaleRange::G8,
        }
    }
}

/// Raw data settings block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataSettings(pub [u8; DataSettings::LEN]);

impl DataSettings {
    pub const LEN: usize = 5;

    pub fn range(&self) -> FullScaleRange {
        FullScaleRange::from_bits(self.0[0])
    }

    pub fn output_data_rate(&self) -> OutputDataRate {
        OutputDataRate::from_bits(self.0[2] >> 3)
    }
}

impl Default for DataSettings {
    /// ±2g at 100Hz.
    fn default() -> Self {
        Self([0x00, 0x00, 0x18, 0x00, 0x00])
    }
}

/// One sample in raw 12-bit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Acceleration {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Acceleration {
    /// Convert counts to g for the given range.
    pub fn in_g(&self, range: FullScaleRange) -> [f32; 3] {
        let scale = range.counts_per_g();
        [
            self.x as f32 / scale,
            self.y as f32 / scale,
            self.z as f32 / scale,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    PortraitUp,
    PortraitDown,
    LandscapeRight,
    LandscapeLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrientationChange {
    pub orientation: Orientation,
    pub back_facing: bool,
}

/// Per-axis event flags with the sign of the triggering motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AxisFlags {
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub x_negative: bool,
    pub y_negative: bool,
    pub z_negative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TapStatus {
    pub double_tap: bool,
    pub axes: AxisFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccelerometerEvent {
    Data(Acceleration),
    DataSettings(DataSettings),
    Orientation(OrientationChange),
    Shake(AxisFlags),
    Tap(TapStatus),
}

fn decode_data_value(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET + 6)?;
    Ok(Some(ModuleEvent::Accelerometer(AccelerometerEvent::Data(
        Acceleration {
            x: i12_packed(data, 2),
            y: i12_packed(data, 4),
            z: i12_packed(data, 6),
        },
    ))))
}

fn decode_data_settings(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET + DataSettings::LEN)?;
    let mut raw = [0u8; DataSettings::LEN];
    raw.copy_from_slice(&data[PAYLOAD_OFFSET..PAYLOAD_OFFSET + DataSettings::LEN]);
    Ok(Some(ModuleEvent::Accelerometer(
        AccelerometerEvent::DataSettings(DataSettings(raw)),
    )))
}

fn decode_orientation(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    let orientation = match (data[2] >> 1) & 0x03 {
        0 => Orientation::PortraitUp,
        1 => Orientation::PortraitDown,
        2 => Orientation::LandscapeRight,
        _ => Orientation::LandscapeLeft,
    };
    Ok(Some(ModuleEvent::Accelerometer(
        AccelerometerEvent::Orientation(OrientationChange {
            orientation,
            back_facing: data[2] & 0x01 != 0,
        }),
    )))
}

// TRANSIENT_SRC: polarity in bits 0/2/4, event flag in bits 1/3/5.
fn decode_shake(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    let src = data[2];
    Ok(Some(ModuleEvent::Accelerometer(AccelerometerEvent::Shake(
        AxisFlags {
            x: src & 0x02 != 0,
            y: src & 0x08 != 0,
            z: src & 0x20 != 0,
            x_negative: src & 0x01 != 0,
            y_negative: src & 0x04 != 0,
            z_negative: src & 0x10 != 0,
        },
    ))))
}

// PULSE_SRC: polarity in bits 0-2, double tap in bit 3, event flags in bits 4-6.
fn decode_tap(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    let src = data[2];
    Ok(Some(ModuleEvent::Accelerometer(AccelerometerEvent::Tap(
        TapStatus {
            double_tap: src & 0x08 != 0,
            axes: AxisFlags {
                x: src & 0x10 != 0,
                y: src & 0x20 != 0,
                z: src & 0x40 != 0,
                x_negative: src & 0x01 != 0,
                y_negative: src & 0x02 != 0,
                z_negative: src & 0x04 != 0,
            },
        },
    ))))
}

/// Accelerometer controller.
pub struct Accelerometer<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Accelerometer<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Power the sensor up with the enabled features.
    pub fn start(&mut self) -> Result<()> {
        self.enable(GLOBAL_ENABLE, true)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.enable(GLOBAL_ENABLE, false)
    }

    pub fn enable_axis_sampling(&mut self, enable: bool) -> Result<()> {
        self.enable(DATA_ENABLE, enable)
    }

    pub fn enable_orientation_detection(&mut self, enable: bool) -> Result<()> {
        self.enable(ORIENTATION_ENABLE, enable)
    }

    pub fn enable_shake_detection(&mut self, enable: bool) -> Result<()> {
        self.enable(SHAKE_ENABLE, enable)
    }

    pub fn enable_tap_detection(&mut self, enable: bool) -> Result<()> {
        self.enable(TAP_ENABLE, enable)
    }

    pub fn read_data_settings(&mut self) -> Result<()> {
        self.sink.read_register(module_id::ACCELEROMETER, DATA_SETTINGS, &[])
    }

    /// Edit sampling settings starting from the power-on defaults.
    pub fn configure(&mut self) -> AccelerometerConfigEditor<'_, S> {
        self.configure_from(DataSettings::default())
    }

    /// Edit sampling settings starting from a block read off the board.
    pub fn configure_from(&mut self, settings: DataSettings) -> AccelerometerConfigEditor<'_, S> {
        AccelerometerConfigEditor {
            sink: &mut *self.sink,
            settings,
        }
    }

    fn enable(&mut self, register: u8, enable: bool) -> Result<()> {
        self.sink.write_register(module_id::ACCELEROMETER, register, &[enable as u8])
    }
}

/// Accumulates a [`DataSettings`] block; [`commit`](Self::commit) writes it.
pub struct AccelerometerConfigEditor<'a, S: ?Sized> {
    sink: &'a mut S,
    settings: DataSettings,
}

impl<'a, S: CommandSink + ?Sized> AccelerometerConfigEditor<'a, S> {
    /// Enable the high-pass filter on the output data.
    pub fn high_pass_filter(mut self, cutoff: u8) -> Self {
        self.settings.0[0] |= 0x10;
        self.settings.0[1] = cutoff & 0x03;
        self
    }

    pub fn settings(&self) -> DataSettings {
        self.settings
    }

    pub fn commit(self) -> Result<()> {
        self.sink.write_register(module_id::ACCELEROMETER, DATA_SETTINGS, &self.settings.0)
    }
}

impl<'a, S: CommandSink + ?Sized> HasOutputDataRate for AccelerometerConfigEditor<'a, S> {
    type Rate = OutputDataRate;

    fn output_data_rate(mut self, rate: OutputDataRate) -> Self {
        self.settings.0[2] = (self.settings.0[2] & !0x38) | (rate.bits() << 3);
        self
    }
}

impl<'a, S: CommandSink + ?Sized> HasRange for AccelerometerConfigEditor<'a, S> {
    type Range = FullScaleRange;

    fn range(mut self, range: FullScaleRange) -> Self {
        self.settings.0[0] = (self.settings.0[0] & !0x03) | range.bits();
        self
    }
}

/// Callbacks for accelerometer events. All default to no-ops.
pub trait AccelerometerListener: Send {
    fn received_data(&mut self, _sample: Acceleration, _ctx: &mut DispatchContext<'_>) {}
    fn received_data_settings(&mut self, _settings: DataSettings, _ctx: &mut DispatchContext<'_>) {}
    fn orientation_changed(&mut self, _change: OrientationChange, _ctx: &mut DispatchContext<'_>) {}
    fn shake_detected(&mut self, _axes: AxisFlags, _ctx: &mut DispatchContext<'_>) {}
    fn tap_detected(&mut self, _status: TapStatus, _ctx: &mut DispatchContext<'_>) {}
}

pub struct AccelerometerAdapter<L>(pub L);

impl<L: AccelerometerListener> Listener for AccelerometerAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        let ModuleEvent::Accelerometer(event) = event else {
            return;
        };
        match *event {
            AccelerometerEvent::Data(sample) => self.0.received_data(sample, ctx),
            AccelerometerEvent::DataSettings(settings) => {
                self.0.received_data_settings(settings, ctx)
            }
            AccelerometerEvent::Orientation(change) => self.0.orientation_changed(change, ctx),
            AccelerometerEvent::Shake(axes) => self.0.shake_detected(axes, ctx),
            AccelerometerEvent::Tap(status) => self.0.tap_detected(status, ctx),
        }
    }
}
