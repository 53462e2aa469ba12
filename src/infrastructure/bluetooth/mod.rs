//! Bluetooth Module
//!
//! Connects the protocol layer to a GATT link.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      BoardService                        │
//! │   (tokio task, one request at a time, op watchdog)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     MetaWearBoard                        │
//! │  sequencer · dispatcher · listeners · BoardEvent stream  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ GattTransport / TransportEvent
//!                       ▼
//!              platform BLE binding, or
//!              RecordingTransport (replay, tests)
//! ```
//!
//! ## Modules
//!
//! - [`gatt`] - MetaWear service and characteristic UUIDs, standard characteristic decoding
//! - [`transport`] - The capability a BLE stack implements to drive a board
//! - [`connection`] - Per-link state machine glue
//! - [`service`] - Async actor and cloneable handle
//! - [`recording`] - Transport that records operations instead of performing them

pub mod connection;
pub mod gatt;
pub mod recording;
pub mod service;
pub mod transport;

pub use connection::MetaWearBoard;
pub use service::{BoardHandle, BoardService};
pub use transport::{GattTransport, TransportEvent};
