//! Supervisor — restarts browser sessions with a crash backoff.

use slotwatch_core::config::SlotWatchConfig;
use slotwatch_core::error::{Result, SlotWatchError};
use slotwatch_core::traits::{Notifier, Page, PageLauncher};
use std::sync::Arc;
use std::time::Duration;

use crate::delay::{DelayGenerator, DelayKind};
use crate::model::ScanResult;
use crate::session::Session;

pub struct Supervisor {
    config: SlotWatchConfig,
    launcher: Arc<dyn PageLauncher>,
    notifier: Arc<dyn Notifier>,
    delays: DelayGenerator,
    attempts: u64,
}

impl Supervisor {
    pub fn new(
        config: SlotWatchConfig,
        launcher: Arc<dyn PageLauncher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let delays = DelayGenerator::new(config.delays.clone());
        Self::with_delays(config, launcher, notifier, delays)
    }

    pub fn with_delays(
        config: SlotWatchConfig,
        launcher: Arc<dyn PageLauncher>,
        notifier: Arc<dyn Notifier>,
        delays: DelayGenerator,
    ) -> Self {
        Self {
            config,
            launcher,
            notifier,
            delays,
            attempts: 0,
        }
    }

    /// Session attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Launch a page, run one full session on it, close it on every exit path.
    /// A session only ends with an error.
    pub async fn run_attempt(&mut self) -> Result<()> {
        self.attempts += 1;
        tracing::info!("🚀 Launching browser (session #{})", self.attempts);
        let page = self.launcher.launch().await?;

        let outcome = Session::new(
            &*page,
            &*self.notifier,
            &self.config,
            &mut self.delays,
        )
        .run()
        .await;

        close_page(&*page).await;
        outcome
    }

    /// Run sessions forever. Each restart starts with no memory of what was
    /// already notified.
    pub async fn run(&mut self) {
        tracing::info!(
            "👀 Watching {} for '{}'",
            self.config.target.url,
            self.config.target.category
        );
        loop {
            let err = match self.run_attempt().await {
                Ok(()) => SlotWatchError::Other("session ended".into()),
                Err(e) => e,
            };
            let delay = self.crash_backoff();
            tracing::error!("💥 Session crashed: {err}");
            tracing::info!("🔁 Restarting browser in {}s", delay.as_secs());
            tokio::time::sleep(delay).await;
        }
    }

    fn crash_backoff(&mut self) -> Duration {
        self.delays.next(DelayKind::CrashBackoff)
    }

    /// One-shot: load, reconcile, scan, close. Nothing is notified.
    pub async fn scan_once(&mut self) -> Result<ScanResult> {
        self.attempts += 1;
        let page = self.launcher.launch().await?;

        let outcome = Session::new(
            &*page,
            &*self.notifier,
            &self.config,
            &mut self.delays,
        )
        .scan_once()
        .await;

        close_page(&*page).await;
        outcome
    }
}

async fn close_page(page: &dyn Page) {
    if let Err(e) = page.close().await {
        tracing::warn!("⚠️ Failed to close browser: {e}");
    }
}
