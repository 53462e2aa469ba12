//! GATT request sequencer.
//!
//! A BLE link services one GATT operation at a time. The sequencer owns three
//! FIFO queues (command writes, characteristic reads, notification enables)
//! and hands out at most one [`GattOperation`] until its completion is
//! reported.
//!
//! ```text
//!   Disconnected ──services discovered──▶ EnablingNotifications
//!                                             │ last descriptor written
//!                                             ▼
//!           ┌──────────────────────────── Ready ◀───────────────────┐
//!           │ command queued                  │ read queued         │
//!           ▼                                 ▼                     │
//!   WritingCharacteristic ──queue empty──▶ (drain) ◀── ReadingCharacteristic
//! ```
//!
//! Whenever the sequencer returns to `Ready` it drains the command queue
//! before the read queue, so configuration and actions are not starved
//! behind housekeeping reads. This ordering is a policy choice; BLE itself
//! does not require it.

use std::collections::VecDeque;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::protocol::command::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequencerState {
    /// No link, or the link is up but services are not yet discovered.
    Disconnected,
    EnablingNotifications,
    Ready,
    ReadingCharacteristic,
    WritingCharacteristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationKind {
    EnableNotifications,
    Write,
    Read,
}

/// One operation handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GattOperation {
    EnableNotifications(Uuid),
    Write {
        characteristic: Uuid,
        command: Command,
    },
    Read(Uuid),
}

impl GattOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            GattOperation::EnableNotifications(_) => OperationKind::EnableNotifications,
            GattOperation::Write { .. } => OperationKind::Write,
            GattOperation::Read(_) => OperationKind::Read,
        }
    }

    pub fn characteristic(&self) -> Uuid {
        match self {
            GattOperation::EnableNotifications(c) | GattOperation::Read(c) => *c,
            GattOperation::Write { characteristic, .. } => *characteristic,
        }
    }
}

/// A completion arrived that does not match the operation in flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{got:?} completion while {in_flight:?} is in flight")]
pub struct UnexpectedCompletion {
    pub got: OperationKind,
    pub in_flight: Option<OperationKind>,
}

/// Result of service discovery: an operation that was still in flight
/// (now abandoned) and the first operation of the new setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub cancelled: Option<GattOperation>,
    pub next: Option<GattOperation>,
}

/// Result of a completion: the finished operation and the one to issue next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub completed: GattOperation,
    pub next: Option<GattOperation>,
}

#[derive(Debug)]
pub struct Sequencer {
    state: SequencerState,
    command_characteristic: Uuid,
    commands: VecDeque<Command>,
    reads: VecDeque<Uuid>,
    notifications: VecDeque<Uuid>,
    in_flight: Option<GattOperation>,
}

impl Sequencer {
    /// Commands are written to `command_characteristic`.
    pub fn new(command_characteristic: Uuid) -> Self {
        Self {
            state: SequencerState::Disconnected,
            command_characteristic,
            commands: VecDeque::new(),
            reads: VecDeque::new(),
            notifications: VecDeque::new(),
            in_flight: None,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn in_flight(&self) -> Option<&GattOperation> {
        self.in_flight.as_ref()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.len()
    }

    /// Queue a command. Returns the operation to issue if the link was idle.
    pub fn enqueue_command(&mut self, command: Command) -> Option<GattOperation> {
        self.commands.push_back(command);
        self.start_if_ready()
    }

    /// Queue a characteristic read. Returns the operation to issue if idle.
    pub fn enqueue_read(&mut self, characteristic: Uuid) -> Option<GattOperation> {
        self.reads.push_back(characteristic);
        self.start_if_ready()
    }

    /// Service discovery finished: every notifiable characteristic has to be
    /// subscribed before user work is serviced. An operation still in flight
    /// (rediscovery without a disconnect) will never complete and is handed
    /// back as cancelled.
    pub fn services_discovered(
        &mut self,
        notifiable: impl IntoIterator<Item = Uuid>,
    ) -> Discovery {
        self.notifications = notifiable.into_iter().collect();
        let cancelled = self.in_flight.take();
        self.state = SequencerState::EnablingNotifications;
        debug!(
            "Services discovered, {} notification(s) to enable",
            self.notifications.len()
        );
        let next = match self.notifications.pop_front() {
            Some(uuid) => self.issue(GattOperation::EnableNotifications(uuid)),
            None => self.drain(),
        };
        Discovery { cancelled, next }
    }

    /// A descriptor write finished. On failure the remaining setup is left
    /// untouched and the state never reaches `Ready`; the caller is expected
    /// to tear the link down.
    pub fn descriptor_written(&mut self, success: bool) -> Result<Advance, UnexpectedCompletion> {
        let completed = self.take_in_flight(OperationKind::EnableNotifications)?;
        let next = if !success {
            None
        } else if let Some(uuid) = self.notifications.pop_front() {
            self.issue(GattOperation::EnableNotifications(uuid))
        } else {
            self.drain()
        };
        Ok(Advance { completed, next })
    }

    /// A command write finished. Failure does not stall the queue.
    pub fn characteristic_written(&mut self) -> Result<Advance, UnexpectedCompletion> {
        let completed = self.take_in_flight(OperationKind::Write)?;
        let next = match self.commands.pop_front() {
            Some(command) => self.issue_write(command),
            None => self.drain(),
        };
        Ok(Advance { completed, next })
    }

    /// A characteristic read finished. Reads keep going while reads are
    /// queued; otherwise the sequencer drains from `Ready`.
    pub fn characteristic_read(&mut self) -> Result<Advance, UnexpectedCompletion> {
        let completed = self.take_in_flight(OperationKind::Read)?;
        let next = match self.reads.pop_front() {
            Some(uuid) => self.issue(GattOperation::Read(uuid)),
            None => self.drain(),
        };
        Ok(Advance { completed, next })
    }

    /// Link lost. The in-flight operation is always returned as cancelled.
    /// Queued work is kept when `keep_pending` (same device will reconnect)
    /// and returned as cancelled otherwise.
    pub fn disconnected(&mut self, keep_pending: bool) -> Vec<GattOperation> {
        let mut cancelled: Vec<GattOperation> = self.in_flight.take().into_iter().collect();
        self.notifications.clear();
        if !keep_pending {
            cancelled.extend(self.clear_pending());
        }
        self.state = SequencerState::Disconnected;
        cancelled
    }

    /// Drop every queued command and read, returning them as operations.
    pub fn clear_pending(&mut self) -> Vec<GattOperation> {
        let characteristic = self.command_characteristic;
        let mut dropped: Vec<GattOperation> = self
            .commands
            .drain(..)
            .map(|command| GattOperation::Write {
                characteristic,
                command,
            })
            .collect();
        dropped.extend(self.reads.drain(..).map(GattOperation::Read));
        dropped
    }

    fn take_in_flight(&mut self, got: OperationKind) -> Result<GattOperation, UnexpectedCompletion> {
        match self.in_flight.take() {
            Some(op) if op.kind() == got => Ok(op),
            other => {
                let in_flight = other.as_ref().map(GattOperation::kind);
                self.in_flight = other;
                Err(UnexpectedCompletion { got, in_flight })
            }
        }
    }

    fn start_if_ready(&mut self) -> Option<GattOperation> {
        if self.state == SequencerState::Ready {
            self.drain()
        } else {
            None
        }
    }

    /// Enter `Ready` and pick the next operation: writes first, then reads.
    fn drain(&mut self) -> Option<GattOperation> {
        self.state = SequencerState::Ready;
        if let Some(command) = self.commands.pop_front() {
            self.issue_write(command)
        } else if let Some(uuid) = self.reads.pop_front() {
            self.issue(GattOperation::Read(uuid))
        } else {
            None
        }
    }

    fn issue_write(&mut self, command: Command) -> Option<GattOperation> {
        let op = GattOperation::Write {
            characteristic: self.command_characteristic,
            command,
        };
        self.issue(op)
    }

    fn issue(&mut self, op: GattOperation) -> Option<GattOperation> {
        self.state = match op.kind() {
            OperationKind::EnableNotifications => SequencerState::EnablingNotifications,
            OperationKind::Write => SequencerState::WritingCharacteristic,
            OperationKind::Read => SequencerState::ReadingCharacteristic,
        };
        debug!("Issuing {:?} ({:?})", op.kind(), self.state);
        self.in_flight = Some(op.clone());
        Some(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMD_CHAR: Uuid = Uuid::from_u128(0x326a9001_85cb_9195_d9dd_464cfbbae75a);
    const NOTIFY_A: Uuid = Uuid::from_u128(0xa);
    const NOTIFY_B: Uuid = Uuid::from_u128(0xb);
    const READ_A: Uuid = Uuid::from_u128(0x2a19);

    fn cmd(bytes: &[u8]) -> Command {
        Command::from_raw(bytes.to_vec())
    }

    fn ready() -> Sequencer {
        let mut seq = Sequencer::new(CMD_CHAR);
        assert!(seq.services_discovered([]).next.is_none());
        assert_eq!(seq.state(), SequencerState::Ready);
        seq
    }

    #[test]
    fn test_commands_queue_until_discovery() {
        let mut seq = Sequencer::new(CMD_CHAR);
        assert!(seq.enqueue_command(cmd(&[1, 1])).is_none());
        assert!(seq.enqueue_read(READ_A).is_none());
        assert_eq!(seq.state(), SequencerState::Disconnected);

        let first = seq.services_discovered([NOTIFY_A, NOTIFY_B]).next.unwrap();
        assert_eq!(first, GattOperation::EnableNotifications(NOTIFY_A));

        let step = seq.descriptor_written(true).unwrap();
        assert_eq!(step.next, Some(GattOperation::EnableNotifications(NOTIFY_B)));
        assert_eq!(seq.state(), SequencerState::EnablingNotifications);

        // Last descriptor done: write drains before read
        let step = seq.descriptor_written(true).unwrap();
        assert_eq!(step.next.unwrap().kind(), OperationKind::Write);
        assert_eq!(seq.state(), SequencerState::WritingCharacteristic);

        let step = seq.characteristic_written().unwrap();
        assert_eq!(step.next, Some(GattOperation::Read(READ_A)));
        assert_eq!(seq.state(), SequencerState::ReadingCharacteristic);

        let step = seq.characteristic_read().unwrap();
        assert!(step.next.is_none());
        assert_eq!(seq.state(), SequencerState::Ready);
    }

    #[test]
    fn test_write_before_read_priority() {
        let mut seq = Sequencer::new(CMD_CHAR);
        seq.enqueue_read(READ_A);
        seq.enqueue_command(cmd(&[2, 1]));
        let op = seq.services_discovered([]).next.unwrap();
        assert_eq!(op.kind(), OperationKind::Write);
    }

    #[test]
    fn test_read_completion_prefers_queued_reads_then_writes() {
        let mut seq = ready();
        assert!(seq.enqueue_read(READ_A).is_some());
        assert!(seq.enqueue_read(NOTIFY_A).is_none());
        assert!(seq.enqueue_command(cmd(&[3, 1])).is_none());

        let step = seq.characteristic_read().unwrap();
        assert_eq!(step.next, Some(GattOperation::Read(NOTIFY_A)));
        let step = seq.characteristic_read().unwrap();
        assert_eq!(step.next.unwrap().kind(), OperationKind::Write);
    }

    #[test]
    fn test_commands_are_fifo() {
        let mut seq = ready();
        let first = seq.enqueue_command(cmd(&[1])).unwrap();
        seq.enqueue_command(cmd(&[2]));
        seq.enqueue_command(cmd(&[3]));
        let mut written = vec![first];
        while let Some(next) = seq.characteristic_written().unwrap().next {
            written.push(next);
        }
        let bytes: Vec<Vec<u8>> = written
            .into_iter()
            .map(|op| match op {
                GattOperation::Write { command, .. } => command.into_bytes(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(bytes, vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_single_flight_under_interleaving() {
        // Deterministic pseudo-random interleaving of enqueues and completions.
        let mut seq = Sequencer::new(CMD_CHAR);
        let mut outstanding: Option<OperationKind> =
            seq.services_discovered([NOTIFY_A, NOTIFY_B]).next.map(|op| op.kind());
        let mut rng: u32 = 0x1234_5678;

        for _ in 0..2000 {
            rng ^= rng << 13;
            rng ^= rng >> 17;
            rng ^= rng << 5;
            let issued = match rng % 4 {
                0 => seq.enqueue_command(cmd(&[1, 1])),
                1 => seq.enqueue_read(READ_A),
                _ => match outstanding {
                    Some(OperationKind::EnableNotifications) => {
                        seq.descriptor_written(true).unwrap().next
                    }
                    Some(OperationKind::Write) => seq.characteristic_written().unwrap().next,
                    Some(OperationKind::Read) => seq.characteristic_read().unwrap().next,
                    None => None,
                },
            };
            if rng % 4 >= 2 {
                outstanding = issued.map(|op| op.kind());
            } else if let Some(op) = issued {
                assert!(outstanding.is_none(), "issued {:?} while busy", op);
                outstanding = Some(op.kind());
            }
            assert_eq!(outstanding, seq.in_flight().map(GattOperation::kind));
        }
    }

    #[test]
    fn test_mismatched_completion_is_rejected() {
        let mut seq = ready();
        assert_eq!(
            seq.characteristic_written().unwrap_err(),
            UnexpectedCompletion {
                got: OperationKind::Write,
                in_flight: None
            }
        );
        seq.enqueue_read(READ_A);
        assert!(seq.characteristic_written().is_err());
        assert_eq!(seq.in_flight().map(GattOperation::kind), Some(OperationKind::Read));
    }

    #[test]
    fn test_failed_descriptor_never_reaches_ready() {
        let mut seq = Sequencer::new(CMD_CHAR);
        seq.enqueue_command(cmd(&[1, 1]));
        seq.services_discovered([NOTIFY_A, NOTIFY_B]);
        let step = seq.descriptor_written(false).unwrap();
        assert!(step.next.is_none());
        assert_eq!(seq.state(), SequencerState::EnablingNotifications);
        assert!(seq.in_flight().is_none());
        // Enqueueing does not start anything while setup is broken
        assert!(seq.enqueue_command(cmd(&[2, 1])).is_none());
    }

    #[test]
    fn test_disconnect_same_device_keeps_queues() {
        let mut seq = ready();
        seq.enqueue_command(cmd(&[1]));
        seq.enqueue_command(cmd(&[2]));
        seq.enqueue_read(READ_A);

        let cancelled = seq.disconnected(true);
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].kind(), OperationKind::Write);
        assert_eq!(seq.pending_commands(), 1);
        assert_eq!(seq.pending_reads(), 1);
        assert_eq!(seq.state(), SequencerState::Disconnected);

        // Resumes after rediscovery
        let op = seq.services_discovered([]).next.unwrap();
        assert_eq!(op.kind(), OperationKind::Write);
    }

    #[test]
    fn test_rediscovery_hands_back_in_flight_operation() {
        let mut seq = ready();
        let write = seq.enqueue_command(cmd(&[2, 1, 1])).unwrap();
        seq.enqueue_command(cmd(&[2, 2, 0]));

        let discovery = seq.services_discovered([NOTIFY_A]);
        assert_eq!(discovery.cancelled, Some(write));
        assert_eq!(discovery.next, Some(GattOperation::EnableNotifications(NOTIFY_A)));
        assert_eq!(seq.pending_commands(), 1);

        // Idle rediscovery cancels nothing
        let mut seq = ready();
        assert!(seq.services_discovered([]).cancelled.is_none());
    }

    #[test]
    fn test_disconnect_new_device_clears_queues() {
        let mut seq = ready();
        seq.enqueue_command(cmd(&[1]));
        seq.enqueue_command(cmd(&[2]));
        seq.enqueue_read(READ_A);

        let cancelled = seq.disconnected(false);
        assert_eq!(cancelled.len(), 3);
        assert_eq!(seq.pending_commands(), 0);
        assert_eq!(seq.pending_reads(), 0);
        assert!(seq.services_discovered([]).next.is_none());
    }
}
