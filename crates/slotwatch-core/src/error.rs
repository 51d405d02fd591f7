//! Error types shared by every SlotWatch crate.

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SlotWatchError>;

#[derive(Debug, thiserror::Error)]
pub enum SlotWatchError {
    /// A bounded wait ran out before its condition held.
    #[error("Timed out after {}ms waiting for {what}", .after.as_millis())]
    Timeout { what: String, after: Duration },

    /// Page content did not match the expected layout (e.g. month header).
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    /// Browser / WebDriver failure, including crashes and disconnects.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Category selection exhausted its retries. Fatal for the session.
    #[error("Category selection failed after {attempts} attempts: {last}")]
    SelectionFailed { attempts: u32, last: String },

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Secrets error: {0}")]
    Secrets(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl SlotWatchError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
