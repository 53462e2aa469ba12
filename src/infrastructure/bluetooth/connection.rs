//! Board connection core
//!
//! [`MetaWearBoard`] owns one link: the sequencer that serializes GATT
//! operations, the dispatcher and listener registry for inbound buffers,
//! and the transport. It is driven by [`TransportEvent`]s and by commands
//! submitted through [`CommandSink`], and reports everything upward as
//! [`BoardEvent`]s.
//!
//! It is synchronous and not thread-safe by itself; wrap it in
//! [`BoardService`](super::service::BoardService) to drive it from async code.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::gatt::{self, COMMAND_CHAR, NOTIFY_CHAR};
use super::transport::{GattTransport, TransportEvent};
use crate::domain::models::{
    BoardEvent, ConnectionStatus, GattStatus, MessageSeverity, StatusMessage,
};
use crate::domain::settings::BoardConfig;
use crate::error::{CatalogError, Result, TransportError};
use crate::modules::CommandSink;
use crate::protocol::dispatcher::{
    DispatchContext, DispatchOutcome, Dispatcher, Listener, ListenerId, ListenerRegistry,
};
use crate::protocol::sequencer::{
    Advance, Discovery, GattOperation, OperationKind, Sequencer, SequencerState,
};
use crate::protocol::{Command, CommandEncoder, RegisterCatalog};

pub struct MetaWearBoard<T> {
    transport: T,
    config: BoardConfig,
    encoder: CommandEncoder,
    dispatcher: Dispatcher,
    sequencer: Sequencer,
    listeners: ListenerRegistry,
    event_sender: mpsc::UnboundedSender<BoardEvent>,
    device: Option<String>,
    connected: bool,
    setup_complete: bool,
    deadline: Option<Instant>,
}

impl<T: GattTransport> MetaWearBoard<T> {
    /// Board over the standard register catalog.
    pub fn new(
        transport: T,
        config: BoardConfig,
        event_sender: mpsc::UnboundedSender<BoardEvent>,
    ) -> Result<Self, CatalogError> {
        let catalog = Arc::new(RegisterCatalog::standard()?);
        Ok(Self::with_catalog(transport, catalog, config, event_sender))
    }

    pub fn with_catalog(
        transport: T,
        catalog: Arc<RegisterCatalog>,
        config: BoardConfig,
        event_sender: mpsc::UnboundedSender<BoardEvent>,
    ) -> Self {
        Self {
            transport,
            encoder: CommandEncoder::new(catalog.clone(), config.max_command_len),
            dispatcher: Dispatcher::new(catalog),
            sequencer: Sequencer::new(COMMAND_CHAR),
            listeners: ListenerRegistry::new(),
            config,
            event_sender,
            device: None,
            connected: false,
            setup_complete: false,
            deadline: None,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.sequencer.state()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Last device this board was connected to.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn add_listener(&mut self, module: u8, listener: Box<dyn Listener>) -> ListenerId {
        self.listeners.add(module, listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Queue a read of a standard characteristic. The value arrives as
    /// [`BoardEvent::CharacteristicRead`].
    pub fn read_characteristic(&mut self, characteristic: Uuid) {
        let next = self.sequencer.enqueue_read(characteristic);
        self.issue(next);
    }

    pub fn read_battery_level(&mut self) {
        self.read_characteristic(gatt::BATTERY_LEVEL);
    }

    pub fn read_device_information(&mut self) {
        for characteristic in gatt::DEVICE_INFORMATION {
            self.read_characteristic(characteristic);
        }
    }

    /// Tear the link down. Queued work is kept for a reconnect to the same
    /// device.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.force_disconnect(false);
    }

    /// When the operation in flight has to complete by.
    pub fn operation_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Give up on the operation in flight if its deadline has passed.
    /// Returns true if the link was torn down.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                warn!(
                    "{:?} did not complete within {:?}, disconnecting",
                    self.sequencer.in_flight().map(GattOperation::kind),
                    self.config.operation_timeout
                );
                self.force_disconnect(true);
                true
            }
            _ => false,
        }
    }

    /// Process one transport callback.
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { device } => self.on_connected(device),
            TransportEvent::ServicesDiscovered { notifiable } => {
                self.setup_complete = false;
                let Discovery { cancelled, next } = self.sequencer.services_discovered(notifiable);
                if let Some(op) = cancelled {
                    warn!("Services rediscovered with {:?} in flight", op.kind());
                    self.send(BoardEvent::OperationCancelled(op));
                }
                self.issue(next);
            }
            TransportEvent::DescriptorWritten {
                characteristic,
                status,
            } => {
                let success = status.is_success();
                match self.sequencer.descriptor_written(success) {
                    Ok(Advance { next, .. }) if success => self.issue(next),
                    Ok(Advance { completed, .. }) => {
                        self.notification_setup_failed(completed.characteristic(), status)
                    }
                    Err(e) => warn!("Ignoring descriptor write on {}: {}", characteristic, e),
                }
            }
            TransportEvent::CharacteristicWritten {
                characteristic,
                status,
            } => match self.sequencer.characteristic_written() {
                Ok(Advance { completed, next }) => {
                    if !status.is_success() {
                        self.command_failed(completed, status);
                    }
                    self.issue(next);
                }
                Err(e) => warn!("Ignoring write completion on {}: {}", characteristic, e),
            },
            TransportEvent::CharacteristicRead {
                characteristic,
                status,
                value,
            } => match self.sequencer.characteristic_read() {
                Ok(Advance { completed, next }) => {
                    let characteristic = completed.characteristic();
                    if status.is_success() {
                        self.send(BoardEvent::CharacteristicRead {
                            characteristic,
                            value: gatt::decode_characteristic(characteristic, &value),
                        });
                    } else {
                        warn!("Read of {} failed: {:?}", characteristic, status);
                        self.send(BoardEvent::ReadFailed {
                            characteristic,
                            status,
                        });
                    }
                    self.issue(next);
                }
                Err(e) => warn!("Ignoring read completion on {}: {}", characteristic, e),
            },
            TransportEvent::CharacteristicChanged {
                characteristic,
                value,
            } => {
                if characteristic == NOTIFY_CHAR {
                    self.dispatch(&value);
                } else {
                    self.send(BoardEvent::CharacteristicRead {
                        characteristic,
                        value: gatt::decode_characteristic(characteristic, &value),
                    });
                }
            }
            TransportEvent::Disconnected => {
                if !self.connected && self.sequencer.state() == SequencerState::Disconnected {
                    debug!("Already disconnected");
                    return;
                }
                self.link_lost(false);
            }
        }
    }

    fn on_connected(&mut self, device: String) {
        if self.connected {
            warn!("Connected event while already connected, resetting link state");
            self.link_lost(false);
        }

        if self.device.as_deref().is_some_and(|d| d != device) {
            let dropped = self.sequencer.clear_pending();
            info!(
                "Connected to a different device, cancelling {} queued operation(s)",
                dropped.len()
            );
            for op in dropped {
                self.send(BoardEvent::OperationCancelled(op));
            }
        }

        info!("Connected to {}", device);
        self.send_log(format!("Connected to {}", device), MessageSeverity::Info);
        self.device = Some(device);
        self.connected = true;
        self.send(BoardEvent::ConnectionStatus(ConnectionStatus::Connected));
    }

    /// Decode a notification, deliver it, then queue whatever the listeners
    /// asked for.
    fn dispatch(&mut self, data: &[u8]) {
        let mut ctx = DispatchContext::new(&self.encoder);
        let outcome = self.dispatcher.dispatch(data, &mut self.listeners, &mut ctx);
        let (commands, reads) = ctx.into_parts();

        match outcome {
            DispatchOutcome::Delivered(event) => self.send(BoardEvent::Module(event)),
            DispatchOutcome::NoPayload => {}
            DispatchOutcome::Dropped(reason) => self.send(BoardEvent::Dropped {
                bytes: data.to_vec(),
                reason,
            }),
        }

        for command in commands {
            let next = self.sequencer.enqueue_command(command);
            self.issue(next);
        }
        for characteristic in reads {
            let next = self.sequencer.enqueue_read(characteristic);
            self.issue(next);
        }
    }

    /// Hand operations to the transport until one is accepted or the queues
    /// run dry. A refused operation counts as a failed completion.
    fn issue(&mut self, mut next: Option<GattOperation>) {
        while let Some(op) = next.take() {
            let result = match &op {
                GattOperation::EnableNotifications(characteristic) => {
                    self.transport.enable_notifications(*characteristic)
                }
                GattOperation::Write {
                    characteristic,
                    command,
                } => {
                    trace!("Writing {}", command);
                    self.transport.write_characteristic(*characteristic, command.as_bytes())
                }
                GattOperation::Read(characteristic) => {
                    self.transport.read_characteristic(*characteristic)
                }
            };

            match result {
                Ok(()) => {
                    self.deadline = self.config.operation_timeout.map(|t| Instant::now() + t);
                }
                Err(e) => {
                    warn!("Transport refused {:?}: {}", op.kind(), e);
                    next = self.refused(e);
                }
            }
        }

        if self.sequencer.in_flight().is_none() {
            self.deadline = None;
        }
        self.check_ready();
    }

    fn refused(&mut self, error: TransportError) -> Option<GattOperation> {
        let status = GattStatus::NotIssued(error.to_string());
        let kind = self.sequencer.in_flight().map(GattOperation::kind)?;
        match kind {
            OperationKind::EnableNotifications => {
                if let Ok(Advance { completed, .. }) = self.sequencer.descriptor_written(false) {
                    self.notification_setup_failed(completed.characteristic(), status);
                }
                None
            }
            OperationKind::Write => {
                let Advance { completed, next } = self.sequencer.characteristic_written().ok()?;
                self.command_failed(completed, status);
                next
            }
            OperationKind::Read => {
                let Advance { completed, next } = self.sequencer.characteristic_read().ok()?;
                self.send(BoardEvent::ReadFailed {
                    characteristic: completed.characteristic(),
                    status,
                });
                next
            }
        }
    }

    fn command_failed(&mut self, completed: GattOperation, status: GattStatus) {
        if let GattOperation::Write { command, .. } = completed {
            warn!("Command {} failed: {:?}", command, status);
            self.send(BoardEvent::CommandFailed { command, status });
        }
    }

    /// Notifications are half set up; the link is unusable until it is
    /// re-established.
    fn notification_setup_failed(&mut self, characteristic: Uuid, status: GattStatus) {
        warn!(
            "Enabling notifications on {} failed: {:?}",
            characteristic, status
        );
        self.send(BoardEvent::NotificationSetupFailed {
            characteristic,
            status,
        });
        self.send_log(
            "Could not enable notifications, disconnecting",
            MessageSeverity::Error,
        );
        self.force_disconnect(false);
    }

    fn check_ready(&mut self) {
        let ready = matches!(
            self.sequencer.state(),
            SequencerState::Ready
                | SequencerState::WritingCharacteristic
                | SequencerState::ReadingCharacteristic
        );
        if ready && !self.setup_complete {
            self.setup_complete = true;
            info!("Board ready");
            self.send_log("Board ready", MessageSeverity::Success);
            self.send(BoardEvent::Ready);
        }
    }

    fn force_disconnect(&mut self, timed_out: bool) {
        self.transport.disconnect();
        self.link_lost(timed_out);
    }

    /// The in-flight operation is reported as cancelled (or timed out);
    /// queued work stays until the next `Connected` decides its fate.
    fn link_lost(&mut self, timed_out: bool) {
        let cancelled = self.sequencer.disconnected(true);
        self.connected = false;
        self.setup_complete = false;
        self.deadline = None;

        for op in cancelled {
            if timed_out {
                self.send(BoardEvent::OperationTimedOut(op));
            } else {
                self.send(BoardEvent::OperationCancelled(op));
            }
        }

        info!(
            "Disconnected, {} command(s) and {} read(s) still queued",
            self.sequencer.pending_commands(),
            self.sequencer.pending_reads()
        );
        self.send_log("Disconnected from device", MessageSeverity::Info);
        self.send(BoardEvent::ConnectionStatus(ConnectionStatus::Disconnected));
    }

    fn send(&self, event: BoardEvent) {
        let _ = self.event_sender.send(event);
    }

    fn send_log(&self, message: impl Into<String>, severity: MessageSeverity) {
        self.send(BoardEvent::LogMessage(StatusMessage {
            message: message.into(),
            severity,
        }));
    }
}

impl<T: GattTransport> CommandSink for MetaWearBoard<T> {
    fn encoder(&self) -> &CommandEncoder {
        &self.encoder
    }

    fn submit(&mut self, command: Command) -> Result<()> {
        trace!("Queueing {}", command);
        let next = self.sequencer.enqueue_command(command);
        self.issue(next);
        Ok(())
    }
}
