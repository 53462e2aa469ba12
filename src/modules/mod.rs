//! Per-module register declarations, decoders and controller façades.
//!
//! Each submodule declares its registers as a static [`ModuleSpec`], the
//! typed event its decoders produce, a listener trait with an adapter for
//! [`crate::protocol::Listener`], and a façade that turns method calls into
//! encoded commands.
//!
//! Façades borrow any [`CommandSink`]: the synchronous connection core, the
//! async service handle, or the [`crate::protocol::DispatchContext`] handed
//! to listeners.

pub mod accelerometer;
pub mod datalog;
pub mod dataproc;
pub mod debug;
pub mod device_settings;
pub mod event;
pub mod gpio;
pub mod haptic;
pub mod i2c;
pub mod ibeacon;
pub mod led;
pub mod macros;
pub mod switch;
pub mod temperature;
pub mod timer;

use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::command::{Command, CommandEncoder};
use crate::protocol::event::{ModuleEvent, ModuleInfo};
use crate::protocol::wire::{require, PAYLOAD_OFFSET};

/// Module ids as assigned by the firmware.
pub mod module_id {
    pub const SWITCH: u8 = 0x01;
    pub const LED: u8 = 0x02;
    pub const ACCELEROMETER: u8 = 0x03;
    pub const TEMPERATURE: u8 = 0x04;
    pub const GPIO: u8 = 0x05;
    pub const IBEACON: u8 = 0x07;
    pub const HAPTIC: u8 = 0x08;
    pub const DATA_PROCESSOR: u8 = 0x09;
    pub const EVENT: u8 = 0x0a;
    pub const LOGGING: u8 = 0x0b;
    pub const TIMER: u8 = 0x0c;
    pub const I2C: u8 = 0x0d;
    pub const MACRO: u8 = 0x0f;
    pub const SETTINGS: u8 = 0x11;
    pub const DEBUG: u8 = 0xfe;
}

/// Every module known to the standard catalog.
pub const ALL: &[ModuleSpec] = &[
    switch::MODULE,
    led::MODULE,
    accelerometer::MODULE,
    temperature::MODULE,
    gpio::MODULE,
    ibeacon::MODULE,
    haptic::MODULE,
    dataproc::MODULE,
    event::MODULE,
    datalog::MODULE,
    timer::MODULE,
    i2c::MODULE,
    macros::MODULE,
    device_settings::MODULE,
    debug::MODULE,
];

/// Register 0x00 of every module: implementation and revision.
pub const INFO_REGISTER: u8 = 0x00;

pub(crate) const INFO: RegisterSpec = RegisterSpec::new(INFO_REGISTER, "INFO")
    .write(Arity::Unsupported)
    .read(Arity::Exact(0))
    .decode(decode_info);

fn decode_info(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET)?;
    let info = if data.len() > PAYLOAD_OFFSET {
        require(data, PAYLOAD_OFFSET + 2)?;
        ModuleInfo {
            module: data[0],
            present: true,
            implementation: data[2],
            revision: data[3],
        }
    } else {
        ModuleInfo {
            module: data[0],
            present: false,
            implementation: 0xff,
            revision: 0xff,
        }
    };
    Ok(Some(ModuleEvent::Info(info)))
}

/// Something that accepts encoded commands.
pub trait CommandSink {
    fn encoder(&self) -> &CommandEncoder;

    /// Queue a command for the command characteristic.
    fn submit(&mut self, command: Command) -> Result<()>;

    /// Queue commands that only make sense together. Encode them all first
    /// so a rejected one leaves nothing half-written on the board.
    fn submit_all(&mut self, commands: Vec<Command>) -> Result<()> {
        for command in commands {
            self.submit(command)?;
        }
        Ok(())
    }

    fn write_register(&mut self, module: u8, register: u8, params: &[u8]) -> Result<()> {
        let command = self.encoder().write(module, register, params)?;
        self.submit(command)
    }

    fn read_register(&mut self, module: u8, register: u8, params: &[u8]) -> Result<()> {
        let command = self.encoder().read(module, register, params)?;
        self.submit(command)
    }

    /// Ask a module for its implementation and revision.
    fn read_module_info(&mut self, module: u8) -> Result<()> {
        self.read_register(module, INFO_REGISTER, &[])
    }
}

/// Façade accessors for every [`CommandSink`].
pub trait ModuleControllers: CommandSink + Sized {
    fn switch(&mut self) -> switch::Switch<'_, Self> {
        switch::Switch::new(self)
    }

    fn led(&mut self) -> led::Led<'_, Self> {
        led::Led::new(self)
    }

    fn accelerometer(&mut self) -> accelerometer::Accelerometer<'_, Self> {
        accelerometer::Accelerometer::new(self)
    }

    fn temperature(&mut self) -> temperature::Temperature<'_, Self> {
        temperature::Temperature::new(self)
    }

    fn gpio(&mut self) -> gpio::Gpio<'_, Self> {
        gpio::Gpio::new(self)
    }

    fn ibeacon(&mut self) -> ibeacon::IBeacon<'_, Self> {
        ibeacon::IBeacon::new(self)
    }

    fn haptic(&mut self) -> haptic::Haptic<'_, Self> {
        haptic::Haptic::new(self)
    }

    fn data_processor(&mut self) -> dataproc::DataProcessor<'_, Self> {
        dataproc::DataProcessor::new(self)
    }

    fn events(&mut self) -> event::EventRecorder<'_, Self> {
        event::EventRecorder::new(self)
    }

    fn logging(&mut self) -> datalog::Logging<'_, Self> {
        datalog::Logging::new(self)
    }

    fn timer(&mut self) -> timer::Timer<'_, Self> {
        timer::Timer::new(self)
    }

    fn i2c(&mut self) -> i2c::I2c<'_, Self> {
        i2c::I2c::new(self)
    }

    fn macros(&mut self) -> macros::Macro<'_, Self> {
        macros::Macro::new(self)
    }

    fn settings(&mut self) -> device_settings::Settings<'_, Self> {
        device_settings::Settings::new(self)
    }

    fn debug(&mut self) -> debug::Debug<'_, Self> {
        debug::Debug::new(self)
    }
}

impl<S: CommandSink> ModuleControllers for S {}

/// Sensor configuration editors that select a sampling frequency.
pub trait HasOutputDataRate: Sized {
    type Rate: Copy;

    fn output_data_rate(self, rate: Self::Rate) -> Self;
}

/// Sensor configuration editors that select a measurement range.
pub trait HasRange: Sized {
    type Range: Copy;

    fn range(self, range: Self::Range) -> Self;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::CommandSink;
    use crate::error::Result;
    use crate::protocol::command::{Command, CommandEncoder, DEFAULT_MAX_COMMAND_LEN};
    use crate::protocol::dispatcher::{DispatchOutcome, Dispatcher, DispatchContext, ListenerRegistry};
    use crate::protocol::event::ModuleEvent;
    use crate::protocol::RegisterCatalog;

    /// Collects submitted commands.
    pub struct Sink {
        pub encoder: CommandEncoder,
        pub sent: Vec<Vec<u8>>,
    }

    impl Sink {
        pub fn new() -> Self {
            Self {
                encoder: CommandEncoder::new(
                    Arc::new(RegisterCatalog::standard().unwrap()),
                    DEFAULT_MAX_COMMAND_LEN,
                ),
                sent: Vec::new(),
            }
        }
    }

    impl CommandSink for Sink {
        fn encoder(&self) -> &CommandEncoder {
            &self.encoder
        }

        fn submit(&mut self, command: Command) -> Result<()> {
            self.sent.push(command.into_bytes());
            Ok(())
        }
    }

    pub fn decode(data: &[u8]) -> Option<ModuleEvent> {
        let catalog = Arc::new(RegisterCatalog::standard().unwrap());
        Dispatcher::new(catalog).decode(data).unwrap()
    }

    /// Dispatch `data` to a single listener on `module`.
    pub fn deliver(module: u8, listener: Box<dyn crate::protocol::Listener>, data: &[u8]) {
        let catalog = Arc::new(RegisterCatalog::standard().unwrap());
        let encoder = CommandEncoder::new(catalog.clone(), DEFAULT_MAX_COMMAND_LEN);
        let mut registry = ListenerRegistry::new();
        registry.add(module, listener);
        let mut ctx = DispatchContext::new(&encoder);
        let outcome = Dispatcher::new(catalog).dispatch(data, &mut registry, &mut ctx);
        assert!(matches!(outcome, DispatchOutcome::Delivered(_)), "{:?}", outcome);
    }
}
