//! Notification sink trait.

use async_trait::async_trait;

use crate::error::Result;

/// Fire-and-forget notification sink consuming a formatted report.
/// Send failures propagate to the caller; sinks do not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}
