//! I2C bus passthrough.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::require;

pub const READ_WRITE: u8 = 0x01;

/// Id used for writes; reads carry a caller-chosen id echoed in the reply.
const WRITE_ID: u8 = 0xff;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::I2C,
    name: "i2c",
    registers: &[
        INFO,
        RegisterSpec::new(READ_WRITE, "READ_WRITE")
            .read(Arity::Exact(4))
            .decode(decode_read_write),
    ],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct I2cEvent {
    pub id: u8,
    pub data: Vec<u8>,
}

fn decode_read_write(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    Ok(Some(ModuleEvent::I2c(I2cEvent {
        id: data[2],
        data: data[3..].to_vec(),
    })))
}

/// I2C controller.
pub struct I2c<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> I2c<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    pub fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<()> {
        let mut params = vec![device, register, WRITE_ID, data.len() as u8];
        params.extend_from_slice(data);
        self.sink.write_register(module_id::I2C, READ_WRITE, &params)
    }

    /// Read `len` bytes; the reply is tagged with `id`.
    pub fn read(&mut self, device: u8, register: u8, id: u8, len: u8) -> Result<()> {
        self.sink.read_register(module_id::I2C, READ_WRITE, &[device, register, id, len])
    }
}

pub trait I2cListener: Send {
    fn received_data(&mut self, id: u8, data: &[u8], ctx: &mut DispatchContext<'_>);
}

pub struct I2cAdapter<L>(pub L);

impl<L: I2cListener> Listener for I2cAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        if let ModuleEvent::I2c(e) = event {
            self.0.received_data(e.id, &e.data, ctx);
        }
    }
}
