//! Session Loop — drives one browser session end to end.
//!
//! `Init → Reconciled → (Scanning → Notifying? → Sleeping → Refreshing)*`,
//! ending in `Crashed` on the first error. There is no partial-cycle retry
//! here; the supervisor restarts the whole session.

use chrono::Local;
use slotwatch_core::config::SlotWatchConfig;
use slotwatch_core::error::Result;
use slotwatch_core::traits::{Locator, Notifier, Page};
use std::time::Duration;

use crate::delay::{DelayGenerator, DelayKind};
use crate::model::{AvailabilitySignature, ScanResult};
use crate::reconciler::CategoryReconciler;
use crate::report::{diff, format_report};
use crate::scanner::MonthScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    Reconciled,
    Scanning,
    Notifying,
    Sleeping,
    Refreshing,
    Crashed,
}

/// State that survives between cycles of one session. Dropped with the
/// session, so a restart notifies the current availability again.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub last_signature: Option<AvailabilitySignature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// New availability was sent.
    Notified,
    /// Availability matches what was last sent.
    Unchanged,
    NoAvailability,
}

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub kind: CycleKind,
    pub result: ScanResult,
    /// Sleep before the next refresh.
    pub delay: Duration,
}

pub struct Session<'a, P: Page + ?Sized, N: Notifier + ?Sized> {
    page: &'a P,
    notifier: &'a N,
    config: &'a SlotWatchConfig,
    delays: &'a mut DelayGenerator,
    state: SessionState,
    phase: SessionPhase,
}

impl<'a, P: Page + ?Sized, N: Notifier + ?Sized> Session<'a, P, N> {
    pub fn new(
        page: &'a P,
        notifier: &'a N,
        config: &'a SlotWatchConfig,
        delays: &'a mut DelayGenerator,
    ) -> Self {
        Self {
            page,
            notifier,
            config,
            delays,
            state: SessionState::default(),
            phase: SessionPhase::Init,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn ms(&self, ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    /// Open the target page and select the category once.
    pub async fn init(&mut self) -> Result<()> {
        let url = &self.config.target.url;
        tracing::info!("🌐 Opening {url}");
        self.page.goto(url).await?;
        self.page
            .pause(self.ms(self.config.timing.initial_settle_ms))
            .await;

        CategoryReconciler::new(self.page, self.config)
            .ensure_selected()
            .await?;
        self.phase = SessionPhase::Reconciled;
        Ok(())
    }

    /// Read the configured month window.
    pub async fn scan(&mut self) -> Result<ScanResult> {
        self.phase = SessionPhase::Scanning;
        MonthScanner::new(self.page, &self.config.selectors, &self.config.timing)
            .scan_window(self.config.target.scan_next_months)
            .await
    }

    /// One cycle: scan, notify if the availability changed, pick the delay.
    /// The last signature only moves forward after a successful send.
    pub async fn scan_and_notify(&mut self) -> Result<CycleOutcome> {
        let result = self.scan().await?;

        if !result.has_availability() {
            let delay = self.delays.next(DelayKind::Idle);
            tracing::info!("😴 No availability, sleeping {}s", delay.as_secs());
            return Ok(CycleOutcome {
                kind: CycleKind::NoAvailability,
                result,
                delay,
            });
        }

        let signature = result.signature();
        let kind = if diff(&signature, self.state.last_signature.as_ref()) {
            self.phase = SessionPhase::Notifying;
            tracing::info!(
                "📧 New availability ({} date(s)), notifying via {}",
                result.total(),
                self.notifier.name()
            );
            let body = format_report(&result, Local::now().naive_local(), &self.config.target.url);
            self.notifier
                .notify(&self.config.email.subject, &body)
                .await?;
            self.state.last_signature = Some(signature);
            CycleKind::Notified
        } else {
            tracing::info!("📭 Availability unchanged, not notifying again");
            CycleKind::Unchanged
        };

        let delay = self.delays.next(DelayKind::AfterNotify);
        tracing::info!("😴 Availability open, sleeping {}s", delay.as_secs());
        Ok(CycleOutcome {
            kind,
            result,
            delay,
        })
    }

    /// Reload back to the current month and reselect the category.
    pub async fn refresh(&mut self) -> Result<()> {
        self.phase = SessionPhase::Refreshing;
        tracing::info!("🔄 Reloading page");
        self.page.reload().await?;
        self.page
            .pause(self.ms(self.config.timing.reload_settle_ms))
            .await;
        self.page
            .wait_visible(
                &Locator::css(&self.config.selectors.calendar),
                self.ms(self.config.timing.calendar_visible_ms),
            )
            .await?;

        CategoryReconciler::new(self.page, self.config)
            .ensure_selected()
            .await?;
        self.phase = SessionPhase::Reconciled;
        Ok(())
    }

    /// Poll until something fails. Only returns with the fatal error.
    pub async fn run(&mut self) -> Result<()> {
        let outcome = self.run_cycles().await;
        if outcome.is_err() {
            self.phase = SessionPhase::Crashed;
        }
        outcome
    }

    async fn run_cycles(&mut self) -> Result<()> {
        self.init().await?;
        loop {
            let outcome = self.scan_and_notify().await?;
            self.phase = SessionPhase::Sleeping;
            tokio::time::sleep(outcome.delay).await;
            self.refresh().await?;
        }
    }

    /// Load, reconcile and scan once without notifying.
    pub async fn scan_once(&mut self) -> Result<ScanResult> {
        let outcome = async {
            self.init().await?;
            self.scan().await
        }
        .await;
        if outcome.is_err() {
            self.phase = SessionPhase::Crashed;
        }
        outcome
    }
}
