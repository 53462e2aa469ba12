//! MetaWear command/response protocol.
//!
//! ## Architecture
//!
//! ```text
//!  application ──▶ module façade ──▶ CommandEncoder ──▶ Sequencer ──▶ transport write
//!
//!  transport notify ──▶ Dispatcher ──▶ RegisterCatalog decode ──▶ ModuleEvent ──▶ listeners
//! ```
//!
//! ## Modules
//!
//! - [`catalog`] - static (module, register) table with per-register decoders
//! - [`command`] - outbound command framing and validation
//! - [`dispatcher`] - inbound buffer decoding and listener delivery
//! - [`sequencer`] - single-flight GATT operation state machine
//! - [`event`] - decoded event types
//! - [`wire`] - byte helpers

pub mod catalog;
pub mod command;
pub mod dispatcher;
pub mod event;
pub mod sequencer;
pub mod wire;

pub use catalog::RegisterCatalog;
pub use command::{Command, CommandEncoder};
pub use dispatcher::{DispatchContext, Dispatcher, Listener, ListenerId, ListenerRegistry};
pub use event::ModuleEvent;
pub use sequencer::{GattOperation, Sequencer, SequencerState};
