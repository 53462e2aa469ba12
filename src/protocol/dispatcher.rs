//! Notification decoder and listener dispatch.
//!
//! An inbound buffer is resolved in the catalog by `data[0]` (module) and
//! `data[1] & 0x7f` (register), decoded by the register's pure decode
//! function, and delivered to every listener registered for that module in
//! registration order.
//!
//! Listeners get a [`DispatchContext`] so they can answer an event with more
//! commands (e.g. read back the configuration of an entry that was just
//! created). Those commands are collected and enqueued after delivery.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::modules::CommandSink;
use crate::protocol::catalog::RegisterCatalog;
use crate::protocol::command::{Command, CommandEncoder};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{to_hex, PAYLOAD_OFFSET, READ_FLAG};

/// Receives decoded events for the module it is registered on.
pub trait Listener: Send {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>);
}

impl<F> Listener for F
where
    F: FnMut(&ModuleEvent, &mut DispatchContext<'_>) + Send,
{
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        self(event, ctx)
    }
}

/// Handle returned by [`ListenerRegistry::add`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Per-module subscriber lists owned by a connection.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    by_module: HashMap<u8, Vec<(ListenerId, Box<dyn Listener>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: u8, listener: Box<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_module.entry(module).or_default().push((id, listener));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        for listeners in self.by_module.values_mut() {
            if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.by_module.clear();
    }

    pub fn count(&self, module: u8) -> usize {
        self.by_module.get(&module).map_or(0, Vec::len)
    }

    fn deliver(&mut self, module: u8, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        if let Some(listeners) = self.by_module.get_mut(&module) {
            for (_, listener) in listeners.iter_mut() {
                listener.on_event(event, ctx);
            }
        }
    }
}

/// Side channel for listeners to queue follow-up work during delivery.
pub struct DispatchContext<'a> {
    encoder: &'a CommandEncoder,
    commands: Vec<Command>,
    reads: Vec<Uuid>,
}

impl<'a> DispatchContext<'a> {
    pub fn new(encoder: &'a CommandEncoder) -> Self {
        Self {
            encoder,
            commands: Vec::new(),
            reads: Vec::new(),
        }
    }

    /// Queue a GATT characteristic read (e.g. battery level).
    pub fn read_characteristic(&mut self, characteristic: Uuid) {
        self.reads.push(characteristic);
    }

    /// Commands and characteristic reads queued during delivery.
    pub fn into_parts(self) -> (Vec<Command>, Vec<Uuid>) {
        (self.commands, self.reads)
    }
}

impl CommandSink for DispatchContext<'_> {
    fn encoder(&self) -> &CommandEncoder {
        self.encoder
    }

    fn submit(&mut self, command: Command) -> Result<()> {
        self.commands.push(command);
        Ok(())
    }
}

/// Why an inbound buffer produced no event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DropReason {
    TooShort,
    UnknownModule(u8),
    UnknownRegister { module: u8, register: u8 },
    Malformed { module: u8, register: u8, error: String },
}

/// Result of dispatching one buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Delivered(ModuleEvent),
    /// Known register without an asynchronous payload.
    NoPayload,
    Dropped(DropReason),
}

/// Resolves inbound buffers against the catalog.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    catalog: Arc<RegisterCatalog>,
}

impl Dispatcher {
    pub fn new(catalog: Arc<RegisterCatalog>) -> Self {
        Self { catalog }
    }

    /// Decode without delivering.
    pub fn decode(&self, data: &[u8]) -> std::result::Result<Option<ModuleEvent>, DropReason> {
        if data.len() < PAYLOAD_OFFSET {
            return Err(DropReason::TooShort);
        }
        let module_id = data[0];
        let register_id = data[1] & !READ_FLAG;

        let module = self
            .catalog
            .module(module_id)
            .ok_or(DropReason::UnknownModule(module_id))?;
        let register = module
            .register(register_id)
            .ok_or(DropReason::UnknownRegister {
                module: module_id,
                register: register_id,
            })?;

        (register.decode)(data).map_err(|e| DropReason::Malformed {
            module: module_id,
            register: register_id,
            error: e.to_string(),
        })
    }

    /// Decode `data` and deliver the event to the module's listeners.
    pub fn dispatch(
        &self,
        data: &[u8],
        listeners: &mut ListenerRegistry,
        ctx: &mut DispatchContext<'_>,
    ) -> DispatchOutcome {
        trace!("Inbound: {}", to_hex(data));
        match self.decode(data) {
            Ok(Some(event)) => {
                listeners.deliver(data[0], &event, ctx);
                DispatchOutcome::Delivered(event)
            }
            Ok(None) => DispatchOutcome::NoPayload,
            Err(reason) => {
                warn!("Dropping inbound buffer {}: {:?}", to_hex(data), reason);
                DispatchOutcome::Dropped(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::switch::SwitchEvent;
    use crate::modules::{module_id, ModuleControllers};
    use crate::protocol::command::DEFAULT_MAX_COMMAND_LEN;
    use std::sync::Mutex;

    fn setup() -> (Dispatcher, CommandEncoder) {
        let catalog = Arc::new(RegisterCatalog::standard().unwrap());
        (
            Dispatcher::new(catalog.clone()),
            CommandEncoder::new(catalog, DEFAULT_MAX_COMMAND_LEN),
        )
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let (dispatcher, encoder) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        for tag in 0..3 {
            let order = order.clone();
            registry.add(
                module_id::SWITCH,
                Box::new(move |_: &ModuleEvent, _: &mut DispatchContext<'_>| {
                    order.lock().unwrap().push(tag)
                }),
            );
        }

        let mut ctx = DispatchContext::new(&encoder);
        let outcome = dispatcher.dispatch(&[0x01, 0x01, 0x01], &mut registry, &mut ctx);
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered(ModuleEvent::Switch(SwitchEvent::Pressed))
        );
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_only_module_listeners_receive() {
        let (dispatcher, encoder) = setup();
        let hits = Arc::new(Mutex::new(0));
        let mut registry = ListenerRegistry::new();
        let h = hits.clone();
        registry.add(
            module_id::GPIO,
            Box::new(move |_: &ModuleEvent, _: &mut DispatchContext<'_>| *h.lock().unwrap() += 1),
        );

        let mut ctx = DispatchContext::new(&encoder);
        dispatcher.dispatch(&[0x01, 0x01, 0x00], &mut registry, &mut ctx);
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let (dispatcher, encoder) = setup();
        let mut registry = ListenerRegistry::new();
        let mut ctx = DispatchContext::new(&encoder);

        assert_eq!(
            dispatcher.dispatch(&[0xAA, 0x01, 0x00], &mut registry, &mut ctx),
            DispatchOutcome::Dropped(DropReason::UnknownModule(0xAA))
        );
        assert_eq!(
            dispatcher.dispatch(&[0x01, 0x7f], &mut registry, &mut ctx),
            DispatchOutcome::Dropped(DropReason::UnknownRegister {
                module: 0x01,
                register: 0x7f
            })
        );
        assert_eq!(
            dispatcher.dispatch(&[0x01], &mut registry, &mut ctx),
            DispatchOutcome::Dropped(DropReason::TooShort)
        );
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let (dispatcher, _) = setup();
        assert!(matches!(
            dispatcher.decode(&[0x01, 0x01]),
            Err(DropReason::Malformed { module: 0x01, register: 0x01, .. })
        ));
    }

    #[test]
    fn test_listener_can_queue_commands() {
        let (dispatcher, encoder) = setup();
        let mut registry = ListenerRegistry::new();
        registry.add(
            module_id::SWITCH,
            Box::new(|_: &ModuleEvent, ctx: &mut DispatchContext<'_>| {
                ctx.led().stop(true).unwrap();
            }),
        );

        let mut ctx = DispatchContext::new(&encoder);
        dispatcher.dispatch(&[0x01, 0x01, 0x01], &mut registry, &mut ctx);
        let (commands, reads) = ctx.into_parts();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].as_bytes(), &[0x02, 0x02, 0x01]);
        assert!(reads.is_empty());
    }

    #[test]
    fn test_remove_listener() {
        let mut registry = ListenerRegistry::new();
        let id = registry.add(
            module_id::SWITCH,
            Box::new(|_: &ModuleEvent, _: &mut DispatchContext<'_>| {}),
        );
        assert_eq!(registry.count(module_id::SWITCH), 1);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.count(module_id::SWITCH), 0);
    }
}
