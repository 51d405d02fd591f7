//! # SlotWatch Core
//! Shared errors, configuration, secrets and collaborator traits.

pub mod config;
pub mod error;
pub mod secrets;
pub mod traits;

pub use config::SlotWatchConfig;
pub use error::{Result, SlotWatchError};
pub use secrets::Secrets;
