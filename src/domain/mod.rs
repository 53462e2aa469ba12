//! Plain data shared across layers: board events and settings.

pub mod models;
pub mod settings;
