use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::dispatcher::DropReason;
use crate::protocol::event::ModuleEvent;
use crate::protocol::{Command, GattOperation};

/// Everything a board reports upward, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BoardEvent {
    ConnectionStatus(ConnectionStatus),
    /// Every notification is enabled; user commands are now serviced.
    Ready,
    Module(ModuleEvent),
    /// Value of a standard characteristic, from a read or a notification.
    CharacteristicRead {
        characteristic: Uuid,
        value: CharacteristicValue,
    },
    CommandFailed {
        command: Command,
        status: GattStatus,
    },
    ReadFailed {
        characteristic: Uuid,
        status: GattStatus,
    },
    NotificationSetupFailed {
        characteristic: Uuid,
        status: GattStatus,
    },
    OperationCancelled(GattOperation),
    OperationTimedOut(GattOperation),
    Dropped {
        bytes: Vec<u8>,
        reason: DropReason,
    },
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

/// Completion status of a GATT operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GattStatus {
    Success,
    /// ATT error code reported by the stack.
    Failure(u8),
    /// The transport refused to start the operation.
    NotIssued(String),
}

impl GattStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, GattStatus::Success)
    }
}

/// Decoded value of a standard (non-MetaWear) characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CharacteristicValue {
    /// Percent.
    BatteryLevel(u8),
    DeviceInformation { field: &'static str, value: String },
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
