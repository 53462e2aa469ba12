//! Event module: commands the board runs when a data source fires.
//!
//! Recording takes two writes: `ENTRY` names the source and the target
//! command header, `CMD_PARAMETERS` carries the target's parameter bytes.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{CommandError, DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::command::Command;
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{is_read_response, require, SourceDescriptor, PAYLOAD_OFFSET};

pub const ENTRY: u8 = 0x02;
pub const CMD_PARAMETERS: u8 = 0x03;
pub const REMOVE: u8 = 0x04;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::EVENT,
    name: "event",
    registers: &[
        INFO,
        RegisterSpec::new(ENTRY, "ENTRY")
            .write(Arity::Exact(6))
            .read(Arity::Exact(1))
            .decode(decode_entry),
        RegisterSpec::new(CMD_PARAMETERS, "CMD_PARAMETERS"),
        RegisterSpec::new(REMOVE, "REMOVE").write(Arity::Exact(1)),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandEntryEvent {
    Created {
        id: u8,
    },
    Config {
        source: SourceDescriptor,
        module: u8,
        register: u8,
        params_len: u8,
    },
}

fn decode_entry(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let event = if is_read_response(data) {
        require(data, PAYLOAD_OFFSET + 6)?;
        CommandEntryEvent::Config {
            source: SourceDescriptor::from_bytes(data, PAYLOAD_OFFSET)?,
            module: data[5],
            register: data[6],
            params_len: data[7],
        }
    } else {
        require(data, 3)?;
        CommandEntryEvent::Created { id: data[2] }
    };
    Ok(Some(ModuleEvent::CommandEntry(event)))
}

/// Event module controller.
pub struct EventRecorder<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> EventRecorder<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Have the board run `command` every time `source` fires. The entry id
    /// arrives as [`CommandEntryEvent::Created`].
    pub fn record(&mut self, source: SourceDescriptor, command: &Command) -> Result<()> {
        let header = source.to_bytes();
        let [module, register, params @ ..] = command.as_bytes() else {
            return Err(CommandError::MissingHeader.into());
        };
        let encoder = self.sink.encoder();
        let entry = encoder.write(
            module_id::EVENT,
            ENTRY,
            &[
                header[0],
                header[1],
                header[2],
                *module,
                *register,
                params.len() as u8,
            ],
        )?;
        let parameters = encoder.write(module_id::EVENT, CMD_PARAMETERS, params)?;
        self.sink.submit_all(vec![entry, parameters])
    }

    pub fn read_entry(&mut self, id: u8) -> Result<()> {
        self.sink.read_register(module_id::EVENT, ENTRY, &[id])
    }

    pub fn remove_entry(&mut self, id: u8) -> Result<()> {
        self.sink.write_register(module_id::EVENT, REMOVE, &[id])
    }
}

pub trait CommandEntryListener: Send {
    fn received_entry_id(&mut self, _id: u8, _ctx: &mut DispatchContext<'_>) {}
    fn received_entry_config(&mut self, _entry: CommandEntryEvent, _ctx: &mut DispatchContext<'_>) {}
}

pub struct CommandEntryAdapter<L>(pub L);

impl<L: CommandEntryListener> Listener for CommandEntryAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        match event {
            ModuleEvent::CommandEntry(CommandEntryEvent::Created { id }) => {
                self.0.received_entry_id(*id, ctx)
            }
            ModuleEvent::CommandEntry(entry) => self.0.received_entry_config(*entry, ctx),
            _ => {}
        }
    }
}
