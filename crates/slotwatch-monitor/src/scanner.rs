//! Month Scanner — reads availability markers month by month.
//!
//! The calendar only moves forward. A full page reload is the way back to the
//! current month, so a scan window is always read front to back.

use regex::Regex;
use slotwatch_core::config::{SelectorConfig, TimingConfig};
use slotwatch_core::error::Result;
use slotwatch_core::traits::{ClickMode, Locator, Page};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use crate::model::{AvailableDate, MonthLabel, ScanResult};

/// ASCII or full-width digits; full-width ones are folded before parsing.
static DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9０-９]{1,2})\b").expect("valid day regex"));

fn fold_fullwidth_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// First 1–2 digit number in a day cell's text.
pub fn day_of_month(cell_text: &str) -> Option<u32> {
    DAY_RE
        .captures(cell_text)
        .and_then(|caps| fold_fullwidth_digits(&caps[1]).parse().ok())
}

/// Normalized, deduplicated, sorted dates for `month` from marker cell texts.
/// Cells without a valid day number for the month are skipped.
pub fn dates_from_cells<S: AsRef<str>>(month: MonthLabel, cells: &[S]) -> BTreeSet<AvailableDate> {
    cells
        .iter()
        .filter_map(|text| day_of_month(text.as_ref()))
        .filter_map(|day| month.date(day))
        .map(AvailableDate::new)
        .collect()
}

pub struct MonthScanner<'a, P: Page + ?Sized> {
    page: &'a P,
    timing: &'a TimingConfig,
    month_label: Locator,
    next_month: Locator,
    markers: Locator,
}

impl<'a, P: Page + ?Sized> MonthScanner<'a, P> {
    pub fn new(page: &'a P, selectors: &SelectorConfig, timing: &'a TimingConfig) -> Self {
        let markers = format!(
            "{} {} img[src*='{}']",
            selectors.calendar, selectors.calendar_body, selectors.marker_src
        );
        Self {
            page,
            timing,
            month_label: Locator::css(&selectors.month_label),
            next_month: Locator::css(&selectors.next_month),
            markers: Locator::css(markers),
        }
    }

    fn ms(&self, ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    /// Parse the calendar header. `Parse` errors are fatal: the layout changed.
    pub async fn displayed_month(&self) -> Result<MonthLabel> {
        self.page
            .wait_visible(&self.month_label, self.ms(self.timing.label_visible_ms))
            .await?;
        let text = self.page.inner_text(&self.month_label).await?;
        MonthLabel::parse(&text)
    }

    /// Click "next" and confirm the header moved. Falls back to a forced
    /// click, then a script click. Returns `false` (and logs) if the label
    /// never changed or the script click itself failed; a stalled calendar
    /// is not an error.
    pub async fn advance_to_next_month(&self) -> Result<bool> {
        let before = self.displayed_month().await?;
        tracing::info!("➡️ Next month (current: {before})");

        let click_timeout = self.ms(self.timing.click_ms);
        self.page
            .wait_visible(&self.next_month, self.ms(self.timing.label_visible_ms))
            .await?;
        if let Err(e) = self
            .page
            .click(&self.next_month, ClickMode::Normal, click_timeout)
            .await
        {
            tracing::debug!("Normal click on next failed ({e}), forcing");
            if let Err(e) = self
                .page
                .click(&self.next_month, ClickMode::Forced, click_timeout)
                .await
            {
                tracing::warn!("⚠️ Forced click on next failed: {e}");
            }
        }

        self.page.pause(self.ms(self.timing.nav_settle_ms)).await;
        let mut after = self.displayed_month().await?;
        if after == before {
            tracing::info!("↪️ Month label unchanged, trying script click");
            match self
                .page
                .click(&self.next_month, ClickMode::Script, click_timeout)
                .await
            {
                Ok(()) => {
                    self.page.pause(self.ms(self.timing.nav_settle_ms)).await;
                    after = self.displayed_month().await?;
                }
                Err(e) => tracing::warn!("⚠️ Script click on next failed: {e}"),
            }
        }

        if after == before {
            tracing::warn!("⚠️ Calendar stuck on {before}; continuing with a shorter scan");
            Ok(false)
        } else {
            tracing::info!("🗓️ Moved to {after}");
            Ok(true)
        }
    }

    pub async fn scan_current_month(&self) -> Result<BTreeSet<AvailableDate>> {
        let month = self.displayed_month().await?;
        self.scan_month(month).await
    }

    async fn scan_month(&self, month: MonthLabel) -> Result<BTreeSet<AvailableDate>> {
        tracing::info!("🔎 Scanning {month}");
        let cells = self.page.enclosing_texts(&self.markers, "td").await?;
        tracing::debug!("Found {} marker(s) in DOM", cells.len());

        let dates = dates_from_cells(month, &cells);
        if dates.is_empty() {
            tracing::info!("No available dates in {month}");
        }
        for d in &dates {
            tracing::info!("✅ Available: {} ({})", d.iso(), d.weekday);
        }
        Ok(dates)
    }

    /// Current month plus `next_months` forward.
    pub async fn scan_window(&self, next_months: u32) -> Result<ScanResult> {
        let mut result = ScanResult::new();
        for i in 0..=next_months {
            let month = self.displayed_month().await?;
            tracing::info!("📅 Month {}/{}: {month}", i + 1, next_months + 1);
            result.insert(month, self.scan_month(month).await?);

            if i < next_months {
                self.advance_to_next_month().await?;
            }
        }
        Ok(result)
    }
}
