//! Log-only sink for dry runs: writes the report to the log instead of
//! sending it anywhere.

use async_trait::async_trait;
use slotwatch_core::error::Result;
use slotwatch_core::traits::Notifier;

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        tracing::info!("📝 [dry-run] {subject}\n{body}");
        Ok(())
    }
}
