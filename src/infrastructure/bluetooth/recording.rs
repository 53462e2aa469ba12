//! In-memory transport that records every operation it is asked to start.
//!
//! Used by the replay command and by tests: the caller inspects what the
//! board issued and feeds completions back through
//! [`MetaWearBoard::handle`](super::connection::MetaWearBoard::handle).

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::transport::GattTransport;
use crate::error::TransportError;
use crate::protocol::wire::to_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Write { characteristic: Uuid, value: Vec<u8> },
    Read(Uuid),
    EnableNotifications(Uuid),
    Disconnect,
}

impl std::fmt::Display for TransportCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportCall::Write { characteristic, value } => {
                write!(f, "write {} [{}]", characteristic, to_hex(value))
            }
            TransportCall::Read(c) => write!(f, "read {}", c),
            TransportCall::EnableNotifications(c) => write!(f, "enable notifications {}", c),
            TransportCall::Disconnect => f.write_str("disconnect"),
        }
    }
}

#[derive(Debug, Default)]
struct Log {
    calls: Vec<TransportCall>,
    refuse_next: Option<TransportError>,
}

/// Cloning shares the log, so a test can keep a handle after moving the
/// transport into a board.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<Log>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations issued so far, oldest first.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Drain the recorded operations.
    pub fn take_calls(&self) -> Vec<TransportCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Refuse the next operation with `error` instead of recording it.
    pub fn refuse_next(&self, error: TransportError) {
        self.lock().refuse_next = Some(error);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: TransportCall) -> Result<(), TransportError> {
        let mut log = self.lock();
        if let Some(error) = log.refuse_next.take() {
            return Err(error);
        }
        log.calls.push(call);
        Ok(())
    }
}

impl GattTransport for RecordingTransport {
    fn write_characteristic(&mut self, characteristic: Uuid, value: &[u8]) -> Result<(), TransportError> {
        self.record(TransportCall::Write {
            characteristic,
            value: value.to_vec(),
        })
    }

    fn read_characteristic(&mut self, characteristic: Uuid) -> Result<(), TransportError> {
        self.record(TransportCall::Read(characteristic))
    }

    fn enable_notifications(&mut self, characteristic: Uuid) -> Result<(), TransportError> {
        self.record(TransportCall::EnableNotifications(characteristic))
    }

    fn disconnect(&mut self) {
        self.lock().calls.push(TransportCall::Disconnect);
    }
}
