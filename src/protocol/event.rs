//! Typed events produced by register decoders.

use serde::Serialize;

use crate::modules::{
    accelerometer::AccelerometerEvent, dataproc::DataProcessorEvent, datalog::LoggingEvent,
    device_settings::SettingsEvent, event::CommandEntryEvent, gpio::GpioEvent, i2c::I2cEvent,
    ibeacon::IBeaconEvent, macros::MacroEvent, switch::SwitchEvent,
    temperature::TemperatureEvent, timer::TimerEvent,
};

/// Response to a read of a module's `INFO` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub module: u8,
    /// False when the board answered with an empty payload.
    pub present: bool,
    pub implementation: u8,
    pub revision: u8,
}

/// One decoded inbound buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModuleEvent {
    Info(ModuleInfo),
    Switch(SwitchEvent),
    Accelerometer(AccelerometerEvent),
    Temperature(TemperatureEvent),
    Gpio(GpioEvent),
    IBeacon(IBeaconEvent),
    DataProcessor(DataProcessorEvent),
    CommandEntry(CommandEntryEvent),
    Logging(LoggingEvent),
    Timer(TimerEvent),
    I2c(I2cEvent),
    Macro(MacroEvent),
    Settings(SettingsEvent),
}
