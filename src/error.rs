//! Error types for the MetaWear protocol core.

use thiserror::Error;
use uuid::Uuid;

/// Static register table is inconsistent. Raised once while the catalog is
/// built; a board cannot be created from a broken table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("module id {0:#04x} is declared more than once")]
    DuplicateModule(u8),
    #[error("register id {register:#04x} is declared more than once in module {module:#04x}")]
    DuplicateRegister { module: u8, register: u8 },
    #[error("register id {register:#04x} in module {module:#04x} uses the read flag bit")]
    RegisterIdOutOfRange { module: u8, register: u8 },
}

/// A command could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown module {0:#04x}")]
    UnknownModule(u8),
    #[error("register {register:#04x} is not declared in module {module:#04x}")]
    UnknownRegister { module: u8, register: u8 },
    #[error("register {module:#04x}:{register:#04x} expects {expected} parameter byte(s), got {actual}")]
    ParameterCount {
        module: u8,
        register: u8,
        expected: String,
        actual: usize,
    },
    #[error("register {module:#04x}:{register:#04x} does not support {access}")]
    NotSupported {
        module: u8,
        register: u8,
        access: &'static str,
    },
    #[error("command is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("embedded command has no module/register header")]
    MissingHeader,
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
}

/// An inbound buffer matched a register but its payload was unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("payload is not ASCII")]
    NotAscii,
}

/// The transport refused to start an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("transport rejected operation: {0}")]
    Rejected(String),
}

/// Umbrella error for board-level calls.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("board service has shut down")]
    ServiceClosed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
