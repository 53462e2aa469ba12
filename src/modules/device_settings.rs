//! Advertising and radio settings.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{CommandError, DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{require, u16_le, PAYLOAD_OFFSET};

pub const DEVICE_NAME: u8 = 0x01;
pub const ADVERTISING_INTERVAL: u8 = 0x02;
pub const TX_POWER: u8 = 0x03;
pub const START_ADVERTISING: u8 = 0x05;

/// Longest name the firmware stores.
pub const MAX_DEVICE_NAME_LEN: usize = 8;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::SETTINGS,
    name: "settings",
    registers: &[
        INFO,
        RegisterSpec::new(DEVICE_NAME, "DEVICE_NAME")
            .write(Arity::Between(1, MAX_DEVICE_NAME_LEN))
            .read(Arity::Exact(0))
            .decode(decode_device_name),
        RegisterSpec::new(ADVERTISING_INTERVAL, "ADVERTISING_INTERVAL")
            .write(Arity::Exact(3))
            .read(Arity::Exact(0))
            .decode(decode_advertising_interval),
        RegisterSpec::new(TX_POWER, "TX_POWER")
            .write(Arity::Exact(1))
            .read(Arity::Exact(0))
            .decode(decode_tx_power),
        RegisterSpec::new(START_ADVERTISING, "START_ADVERTISING").write(Arity::Exact(0)),
    ],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SettingsEvent {
    DeviceName(String),
    AdvertisingInterval { interval: u16, timeout: u8 },
    TxPower(i8),
}

fn decode_device_name(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET)?;
    let name = &data[PAYLOAD_OFFSET..];
    if !name.is_ascii() {
        return Err(DecodeError::NotAscii);
    }
    let name = name.iter().map(|&b| b as char).collect();
    Ok(Some(ModuleEvent::Settings(SettingsEvent::DeviceName(name))))
}

fn decode_advertising_interval(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET + 3)?;
    Ok(Some(ModuleEvent::Settings(
        SettingsEvent::AdvertisingInterval {
            interval: u16_le(data, 2),
            timeout: data[4],
        },
    )))
}

fn decode_tx_power(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    Ok(Some(ModuleEvent::Settings(SettingsEvent::TxPower(
        data[2] as i8,
    ))))
}

/// Settings controller.
pub struct Settings<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Settings<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Advertised name, ASCII, at most [`MAX_DEVICE_NAME_LEN`] bytes.
    pub fn set_device_name(&mut self, name: &str) -> Result<()> {
        if !name.is_ascii() {
            return Err(CommandError::InvalidParameter {
                name: "device name",
                reason: "not ASCII",
            }
            .into());
        }
        self.sink.write_register(module_id::SETTINGS, DEVICE_NAME, name.as_bytes())
    }

    /// `interval` in milliseconds, `timeout` in seconds (0 = never).
    pub fn set_advertising_interval(&mut self, interval: u16, timeout: u8) -> Result<()> {
        let [lo, hi] = interval.to_le_bytes();
        self.sink.write_register(module_id::SETTINGS, ADVERTISING_INTERVAL, &[lo, hi, timeout])
    }

    pub fn set_tx_power(&mut self, dbm: i8) -> Result<()> {
        self.sink.write_register(module_id::SETTINGS, TX_POWER, &[dbm as u8])
    }

    pub fn start_advertising(&mut self) -> Result<()> {
        self.sink.write_register(module_id::SETTINGS, START_ADVERTISING, &[])
    }

    pub fn read_device_name(&mut self) -> Result<()> {
        self.sink.read_register(module_id::SETTINGS, DEVICE_NAME, &[])
    }

    pub fn read_advertising_interval(&mut self) -> Result<()> {
        self.sink.read_register(module_id::SETTINGS, ADVERTISING_INTERVAL, &[])
    }

    pub fn read_tx_power(&mut self) -> Result<()> {
        self.sink.read_register(module_id::SETTINGS, TX_POWER, &[])
    }
}

pub trait SettingsListener: Send {
    fn received_setting(&mut self, setting: &SettingsEvent, ctx: &mut DispatchContext<'_>);
}

pub struct SettingsAdapter<L>(pub L);

impl<L: SettingsListener> Listener for SettingsAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        if let ModuleEvent::Settings(setting) = event {
            self.0.received_setting(setting, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, Error};
    use crate::modules::test_support::{decode, Sink};
    use crate::modules::ModuleControllers;

    #[test]
    fn test_device_name() {
        let mut sink = Sink::new();
        sink.settings().set_device_name("MetaWear").unwrap();
        assert_eq!(sink.sent[0], b"\x11\x01MetaWear".to_vec());

        assert_eq!(
            decode(b"\x11\x81MetaWear"),
            Some(ModuleEvent::Settings(SettingsEvent::DeviceName(
                "MetaWear".to_string()
            )))
        );
    }

    #[test]
    fn test_device_name_limits() {
        let mut sink = Sink::new();
        assert!(matches!(
            sink.settings().set_device_name("NineChars"),
            Err(Error::Command(CommandError::ParameterCount { actual: 9, .. }))
        ));
        assert!(matches!(
            sink.settings().set_device_name("Métá"),
            Err(Error::Command(CommandError::InvalidParameter { .. }))
        ));
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn test_non_ascii_name_is_malformed() {
        let catalog = crate::protocol::RegisterCatalog::standard().unwrap();
        let dispatcher = crate::protocol::Dispatcher::new(std::sync::Arc::new(catalog));
        assert!(dispatcher.decode(&[0x11, 0x81, 0xff]).is_err());
    }

    #[test]
    fn test_advertising_and_power() {
        assert_eq!(
            decode(&[0x11, 0x82, 0xa1, 0x01, 0x00]),
            Some(ModuleEvent::Settings(SettingsEvent::AdvertisingInterval {
                interval: 417,
                timeout: 0
            }))
        );
        assert_eq!(
            decode(&[0x11, 0x83, 0xec]),
            Some(ModuleEvent::Settings(SettingsEvent::TxPower(-20)))
        );
    }
}
