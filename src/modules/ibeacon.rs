//! iBeacon advertising.

use serde::Serialize;
use uuid::Uuid;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{require, u16_le, PAYLOAD_OFFSET};

pub const ENABLE: u8 = 0x01;
pub const AD_UUID: u8 = 0x02;
pub const MAJOR: u8 = 0x03;
pub const MINOR: u8 = 0x04;
pub const RX_POWER: u8 = 0x05;
pub const TX_POWER: u8 = 0x06;
pub const PERIOD: u8 = 0x07;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::IBEACON,
    name: "ibeacon",
    registers: &[
        INFO,
        RegisterSpec::new(ENABLE, "ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(AD_UUID, "AD_UUID")
            .write(Arity::Exact(16))
            .read(Arity::Exact(0))
            .decode(decode_uuid),
        RegisterSpec::new(MAJOR, "MAJOR")
            .write(Arity::Exact(2))
            .read(Arity::Exact(0))
            .decode(decode_major),
        RegisterSpec::new(MINOR, "MINOR")
            .write(Arity::Exact(2))
            .read(Arity::Exact(0))
            .decode(decode_minor),
        RegisterSpec::new(RX_POWER, "RX_POWER")
            .write(Arity::Exact(1))
            .read(Arity::Exact(0))
            .decode(decode_rx_power),
        RegisterSpec::new(TX_POWER, "TX_POWER")
            .write(Arity::Exact(1))
            .read(Arity::Exact(0))
            .decode(decode_tx_power),
        RegisterSpec::new(PERIOD, "PERIOD")
            .write(Arity::Exact(2))
            .read(Arity::Exact(0))
            .decode(decode_period),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IBeaconEvent {
    Uuid(Uuid),
    Major(u16),
    Minor(u16),
    RxPower(i8),
    TxPower(i8),
    /// Advertising period in milliseconds.
    Period(u16),
}

fn event(e: IBeaconEvent) -> Result<Option<ModuleEvent>, DecodeError> {
    Ok(Some(ModuleEvent::IBeacon(e)))
}

// The UUID travels least significant byte first.
fn decode_uuid(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, PAYLOAD_OFFSET + 16)?;
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&data[PAYLOAD_OFFSET..PAYLOAD_OFFSET + 16]);
    bytes.reverse();
    event(IBeaconEvent::Uuid(Uuid::from_bytes(bytes)))
}

fn decode_major(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 4)?;
    event(IBeaconEvent::Major(u16_le(data, 2)))
}

fn decode_minor(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 4)?;
    event(IBeaconEvent::Minor(u16_le(data, 2)))
}

fn decode_rx_power(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    event(IBeaconEvent::RxPower(data[2] as i8))
}

fn decode_tx_power(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    event(IBeaconEvent::TxPower(data[2] as i8))
}

fn decode_period(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 4)?;
    event(IBeaconEvent::Period(u16_le(data, 2)))
}

/// iBeacon controller.
pub struct IBeacon<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> IBeacon<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    pub fn enable(&mut self, enable: bool) -> Result<()> {
        self.sink.write_register(module_id::IBEACON, ENABLE, &[enable as u8])
    }

    pub fn set_uuid(&mut self, uuid: Uuid) -> Result<()> {
        let mut bytes = *uuid.as_bytes();
        bytes.reverse();
        self.sink.write_register(module_id::IBEACON, AD_UUID, &bytes)
    }

    pub fn set_major(&mut self, major: u16) -> Result<()> {
        self.sink.write_register(module_id::IBEACON, MAJOR, &major.to_le_bytes())
    }

    pub fn set_minor(&mut self, minor: u16) -> Result<()> {
        self.sink.write_register(module_id::IBEACON, MINOR, &minor.to_le_bytes())
    }

    pub fn set_rx_power(&mut self, dbm: i8) -> Result<()> {
        self.sink.write_register(module_id::IBEACON, RX_POWER, &[dbm as u8])
    }

    pub fn set_tx_power(&mut self, dbm: i8) -> Result<()> {
        self.sink.write_register(module_id::IBEACON, TX_POWER, &[dbm as u8])
    }

    pub fn set_period(&mut self, ms: u16) -> Result<()> {
        self.sink.write_register(module_id::IBEACON, PERIOD, &ms.to_le_bytes())
    }

    /// Read every advertising parameter back; one event per register.
    pub fn read_setup(&mut self) -> Result<()> {
        for register in [AD_UUID, MAJOR, MINOR, RX_POWER, TX_POWER, PERIOD] {
            self.sink.read_register(module_id::IBEACON, register, &[])?;
        }
        Ok(())
    }
}

pub trait IBeaconListener: Send {
    fn received_setting(&mut self, setting: IBeaconEvent, ctx: &mut DispatchContext<'_>);
}

pub struct IBeaconAdapter<L>(pub L);

impl<L: IBeaconListener> Listener for IBeaconAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        if let ModuleEvent::IBeacon(setting) = event {
            self.0.received_setting(*setting, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::{decode, Sink};
    use crate::modules::ModuleControllers;

    const BEACON: Uuid = Uuid::from_u128(0x326a9000_85cb_9195_d9dd_464cfbbae75a);

    #[test]
    fn test_uuid_is_little_endian_on_the_wire() {
        let mut sink = Sink::new();
        sink.ibeacon().set_uuid(BEACON).unwrap();
        let sent = &sink.sent[0];
        assert_eq!(&sent[..2], &[0x07, 0x02]);
        assert_eq!(sent[2], 0x5a);
        assert_eq!(sent[17], 0x32);

        let mut response = vec![0x07, 0x82];
        response.extend_from_slice(&sent[2..]);
        assert_eq!(
            decode(&response),
            Some(ModuleEvent::IBeacon(IBeaconEvent::Uuid(BEACON)))
        );
    }

    #[test]
    fn test_scalar_settings() {
        assert_eq!(
            decode(&[0x07, 0x83, 0x4e, 0x00]),
            Some(ModuleEvent::IBeacon(IBeaconEvent::Major(78)))
        );
        assert_eq!(
            decode(&[0x07, 0x86, 0xf4]),
            Some(ModuleEvent::IBeacon(IBeaconEvent::TxPower(-12)))
        );
    }

    #[test]
    fn test_read_setup_issues_six_reads() {
        let mut sink = Sink::new();
        sink.ibeacon().read_setup().unwrap();
        assert_eq!(sink.sent.len(), 6);
        assert!(sink.sent.iter().all(|c| c[1] & 0x80 != 0));
    }
}
