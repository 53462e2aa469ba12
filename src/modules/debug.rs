//! Board reset and bootloader entry.

use super::{module_id, CommandSink, INFO};
use crate::error::Result;
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};

pub const RESET: u8 = 0x01;
pub const JUMP_TO_BOOTLOADER: u8 = 0x02;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::DEBUG,
    name: "debug",
    registers: &[
        INFO,
        RegisterSpec::new(RESET, "RESET").write(Arity::Exact(0)),
        RegisterSpec::new(JUMP_TO_BOOTLOADER, "JUMP_TO_BOOTLOADER").write(Arity::Exact(0)),
    ],
};

/// Debug controller. Both commands drop the connection.
pub struct Debug<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Debug<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    pub fn reset(&mut self) -> Result<()> {
        self.sink.write_register(module_id::DEBUG, RESET, &[])
    }

    pub fn jump_to_bootloader(&mut self) -> Result<()> {
        self.sink.write_register(module_id::DEBUG, JUMP_TO_BOOTLOADER, &[])
    }
}
