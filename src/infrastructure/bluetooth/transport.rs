//! Transport capability
//!
//! The board does not own a Bluetooth stack. Whatever does (a platform BLE
//! binding, a simulator, a capture replayer) implements [`GattTransport`] to
//! start operations and reports their completions back as
//! [`TransportEvent`]s.

use uuid::Uuid;

use crate::domain::models::GattStatus;
use crate::error::TransportError;

/// Starts GATT operations. Every call returns immediately; the outcome is
/// reported later as a [`TransportEvent`].
pub trait GattTransport: Send {
    fn write_characteristic(&mut self, characteristic: Uuid, value: &[u8]) -> Result<(), TransportError>;

    fn read_characteristic(&mut self, characteristic: Uuid) -> Result<(), TransportError>;

    /// Write the notification-enable value to the characteristic's CCCD.
    fn enable_notifications(&mut self, characteristic: Uuid) -> Result<(), TransportError>;

    /// Tear the link down. A `Disconnected` event may or may not follow.
    fn disconnect(&mut self);
}

/// Callbacks from the transport, delivered one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Link up. `device` identifies the peer (address or platform id).
    Connected { device: String },
    ServicesDiscovered { notifiable: Vec<Uuid> },
    DescriptorWritten { characteristic: Uuid, status: GattStatus },
    CharacteristicWritten { characteristic: Uuid, status: GattStatus },
    CharacteristicRead {
        characteristic: Uuid,
        status: GattStatus,
        value: Vec<u8>,
    },
    /// Unsolicited notification.
    CharacteristicChanged { characteristic: Uuid, value: Vec<u8> },
    Disconnected,
}
