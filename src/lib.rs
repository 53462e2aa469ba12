//! # metawear
//!
//! Host-side core for MbientLab MetaWear boards: build register commands,
//! decode the board's notifications, and drive a GATT link one operation at
//! a time.
//!
//! The crate does not bind to a Bluetooth stack. A platform binding
//! implements [`GattTransport`](infrastructure::bluetooth::GattTransport)
//! and forwards its callbacks as
//! [`TransportEvent`](infrastructure::bluetooth::TransportEvent)s.
//!
//! ## Quick start
//!
//! ```no_run
//! use metawear::prelude::*;
//! use metawear::infrastructure::bluetooth::recording::RecordingTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let board = MetaWearBoard::new(RecordingTransport::new(), BoardConfig::default(), events)?;
//!     let (mut handle, _task) = BoardService::spawn(board);
//!
//!     handle.led().play(false)?;
//!     while let Some(event) = rx.recv().await {
//!         if let BoardEvent::Module(ModuleEvent::Switch(s)) = event {
//!             println!("switch: {:?}", s);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | Glob import of the commonly needed types |
//! | [`protocol`] | Register catalog, command encoder, dispatcher, GATT sequencer |
//! | [`modules`] | Typed controllers and listeners for each board module |
//! | [`infrastructure`] | Board connection, async service, GATT layout, logging |
//! | [`domain`] | Board events and persisted settings |
//! | [`error`] | Error types |

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod modules;
pub mod protocol;

/// Convenience re-exports for downstream crates.
pub mod prelude {
    pub use crate::domain::models::{BoardEvent, CharacteristicValue, ConnectionStatus, GattStatus};
    pub use crate::domain::settings::{BoardConfig, Settings, SettingsService};
    pub use crate::error::{Error, Result};
    pub use crate::infrastructure::bluetooth::{
        BoardHandle, BoardService, GattTransport, MetaWearBoard, TransportEvent,
    };
    pub use crate::modules::{module_id, CommandSink, ModuleControllers};
    pub use crate::protocol::{
        Command, CommandEncoder, DispatchContext, Listener, ListenerId, ModuleEvent,
        RegisterCatalog,
    };
}
