//! Stability Oracle — decides when the calendar is safe to read.
//!
//! The booking page re-renders the calendar asynchronously after any
//! interaction, and reading mid-transition yields truncated or duplicated
//! markers. Two fingerprints are used:
//! - [`CheapProbe`]: length + 64-char head/tail, polled to notice *any* change
//! - [`ContentDigest`]: SHA-256 of the full HTML, sampled twice to confirm the
//!   content stopped changing

use sha2::{Digest, Sha256};
use slotwatch_core::config::TimingConfig;
use slotwatch_core::error::{Result, SlotWatchError};
use slotwatch_core::traits::{Locator, Page};
use std::time::Duration;

const PROBE_EDGE_CHARS: usize = 64;

/// Cheap structural fingerprint of a DOM region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheapProbe {
    pub len: usize,
    pub head: String,
    pub tail: String,
}

impl CheapProbe {
    pub fn of(html: &str) -> Self {
        let len = html.chars().count();
        let head: String = html.chars().take(PROBE_EDGE_CHARS).collect();
        let tail: String = html
            .chars()
            .skip(len.saturating_sub(PROBE_EDGE_CHARS))
            .collect();
        Self { len, head, tail }
    }
}

impl std::fmt::Display for CheapProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.len, self.head, self.tail)
    }
}

/// SHA-256 digest of the full region content (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn of(html: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(html.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How a settle check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Both digest samples matched.
    Stable,
    /// Samples differed; the extra settle period was waited out.
    SettledAfterExtraWait,
}

/// Fingerprints and settle-waits for one page region.
pub struct StabilityOracle<'a, P: Page + ?Sized> {
    page: &'a P,
    region: Locator,
    timing: &'a TimingConfig,
}

impl<'a, P: Page + ?Sized> StabilityOracle<'a, P> {
    pub fn new(page: &'a P, region: Locator, timing: &'a TimingConfig) -> Self {
        Self {
            page,
            region,
            timing,
        }
    }

    pub async fn probe(&self) -> Result<CheapProbe> {
        Ok(CheapProbe::of(&self.page.inner_html(&self.region).await?))
    }

    pub async fn digest(&self) -> Result<ContentDigest> {
        Ok(ContentDigest::of(&self.page.inner_html(&self.region).await?))
    }

    /// Block until the cheap probe differs from `baseline`, then settle.
    /// Fails with `Timeout` if no change is seen within the change timeout.
    pub async fn wait_changed_then_stable(&self, baseline: &CheapProbe) -> Result<Stability> {
        let timeout = Duration::from_millis(self.timing.change_timeout_ms);
        let poll = Duration::from_millis(self.timing.probe_poll_ms.max(1));

        let changed = async {
            loop {
                match self.probe().await {
                    Ok(probe) if probe != *baseline => return Ok(()),
                    Ok(_) => {}
                    // Region detached mid re-render: not changed *yet*.
                    Err(SlotWatchError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                tokio::time::sleep(poll).await;
            }
        };

        tokio::time::timeout(timeout, changed)
            .await
            .map_err(|_| SlotWatchError::timeout(format!("{} to change", self.region), timeout))??;

        tracing::debug!("🗓️ Calendar changed, waiting for it to settle");
        self.settle(Duration::from_millis(self.timing.changed_first_sample_ms))
            .await
    }

    /// Sample the digest twice `sample_gap` apart; if the samples differ,
    /// wait the extra settle period.
    pub async fn settle(&self, first_sample_after: Duration) -> Result<Stability> {
        self.page.pause(first_sample_after).await;
        let first = self.digest().await?;
        self.page
            .pause(Duration::from_millis(self.timing.sample_gap_ms))
            .await;
        let second = self.digest().await?;

        if first == second {
            Ok(Stability::Stable)
        } else {
            tracing::debug!("🗓️ Calendar still moving, extra settle wait");
            self.page
                .pause(Duration::from_millis(self.timing.extra_settle_ms))
                .await;
            Ok(Stability::SettledAfterExtraWait)
        }
    }
}
