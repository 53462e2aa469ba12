//! Macros: command sequences stored in flash and replayed on demand or at
//! boot.
//!
//! `BEGIN` answers a new recording with the macro id. Reading `BEGIN` with
//! an id returns how that macro was stored.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::command::Command;
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{is_read_response, require, PAYLOAD_OFFSET};

pub const ENABLE: u8 = 0x01;
pub const BEGIN: u8 = 0x02;
pub const ADD_COMMAND: u8 = 0x03;
pub const END: u8 = 0x04;
pub const EXECUTE: u8 = 0x05;
pub const ERASE_ALL: u8 = 0x08;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::MACRO,
    name: "macro",
    registers: &[
        INFO,
        RegisterSpec::new(ENABLE, "ENABLE").write(Arity::Exact(1)),
        RegisterSpec::new(BEGIN, "BEGIN")
            .write(Arity::Exact(1))
            .read(Arity::Exact(1))
            .decode(decode_begin),
        RegisterSpec::new(ADD_COMMAND, "ADD_COMMAND").write(Arity::Between(2, 18)),
        RegisterSpec::new(END, "END").write(Arity::Exact(0)),
        RegisterSpec::new(EXECUTE, "EXECUTE").write(Arity::Exact(1)),
        RegisterSpec::new(ERASE_ALL, "ERASE_ALL").write(Arity::Exact(0)),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MacroEvent {
    Created {
        id: u8,
    },
    Info {
        id: u8,
        exec_on_boot: bool,
        commands: u8,
    },
}

fn decode_begin(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let event = if is_read_response(data) {
        require(data, PAYLOAD_OFFSET + 3)?;
        MacroEvent::Info {
            id: data[2],
            exec_on_boot: data[3] != 0,
            commands: data[4],
        }
    } else {
        require(data, 3)?;
        MacroEvent::Created { id: data[2] }
    };
    Ok(Some(ModuleEvent::Macro(event)))
}

/// Macro controller.
pub struct Macro<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> Macro<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Store `commands` as one macro. The id arrives as
    /// [`MacroEvent::Created`].
    ///
    /// Nothing is sent unless every command fits in an `ADD_COMMAND` write.
    pub fn record(&mut self, exec_on_boot: bool, commands: &[Command]) -> Result<()> {
        let encoder = self.sink.encoder();
        let mut batch = Vec::with_capacity(commands.len() + 2);
        batch.push(encoder.write(module_id::MACRO, BEGIN, &[exec_on_boot as u8])?);
        for command in commands {
            batch.push(encoder.write(module_id::MACRO, ADD_COMMAND, command.as_bytes())?);
        }
        batch.push(encoder.write(module_id::MACRO, END, &[])?);
        self.sink.submit_all(batch)
    }

    pub fn read_info(&mut self, id: u8) -> Result<()> {
        self.sink.read_register(module_id::MACRO, BEGIN, &[id])
    }

    pub fn execute(&mut self, id: u8) -> Result<()> {
        self.sink.write_register(module_id::MACRO, EXECUTE, &[id])
    }

    /// Erase every macro. Takes effect after the next reset.
    pub fn erase_all(&mut self) -> Result<()> {
        self.sink.write_register(module_id::MACRO, ERASE_ALL, &[])
    }
}

pub trait MacroListener: Send {
    fn received_macro_id(&mut self, _id: u8, _ctx: &mut DispatchContext<'_>) {}
    fn received_macro_info(
        &mut self,
        _id: u8,
        _exec_on_boot: bool,
        _commands: u8,
        _ctx: &mut DispatchContext<'_>,
    ) {
    }
}

pub struct MacroAdapter<L>(pub L);

impl<L: MacroListener> Listener for MacroAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        match *event {
            ModuleEvent::Macro(MacroEvent::Created { id }) => self.0.received_macro_id(id, ctx),
            ModuleEvent::Macro(MacroEvent::Info {
                id,
                exec_on_boot,
                commands,
            }) => self.0.received_macro_info(id, exec_on_boot, commands, ctx),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support::{decode, Sink};
    use crate::modules::ModuleControllers;
    use crate::protocol::dispatcher::{DispatchOutcome, Dispatcher, ListenerRegistry};
    use crate::protocol::{CommandEncoder, RegisterCatalog};
    use std::sync::Arc;

    #[test]
    fn test_record_sequence() {
        let mut sink = Sink::new();
        let blink = sink.encoder.write(module_id::LED, 0x01, &[0x01]).unwrap();
        sink.macros().record(true, &[blink]).unwrap();
        assert_eq!(
            sink.sent,
            vec![
                vec![0x0f, 0x02, 0x01],
                vec![0x0f, 0x03, 0x02, 0x01, 0x01],
                vec![0x0f, 0x04],
            ]
        );
    }

    #[test]
    fn test_oversized_command_sends_nothing() {
        let mut sink = Sink::new();
        let filter = Command::from_raw([vec![0x09, 0x02], vec![0x00; 18]].concat());
        assert_eq!(filter.len(), 20);

        let err = sink.macros().record(false, &[filter]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Command(crate::error::CommandError::ParameterCount { .. })
        ));
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn test_begin_two_shapes() {
        assert_eq!(
            decode(&[0x0f, 0x02, 0x04]),
            Some(ModuleEvent::Macro(MacroEvent::Created { id: 4 }))
        );
        assert_eq!(
            decode(&[0x0f, 0x82, 0x04, 0x01, 0x03]),
            Some(ModuleEvent::Macro(MacroEvent::Info {
                id: 4,
                exec_on_boot: true,
                commands: 3
            }))
        );
    }

    #[test]
    fn test_listener_reads_back_new_macro() {
        struct ReadBack;
        impl MacroListener for ReadBack {
            fn received_macro_id(&mut self, id: u8, ctx: &mut DispatchContext<'_>) {
                ctx.macros().read_info(id).unwrap();
            }
        }

        let catalog = Arc::new(RegisterCatalog::standard().unwrap());
        let encoder = CommandEncoder::new(catalog.clone(), 20);
        let mut registry = ListenerRegistry::new();
        registry.add(module_id::MACRO, Box::new(MacroAdapter(ReadBack)));

        let mut ctx = DispatchContext::new(&encoder);
        let outcome = Dispatcher::new(catalog).dispatch(&[0x0f, 0x02, 0x04], &mut registry, &mut ctx);
        assert!(matches!(outcome, DispatchOutcome::Delivered(_)));

        let (commands, _) = ctx.into_parts();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].as_bytes(), &[0x0f, 0x82, 0x04]);
    }
}
