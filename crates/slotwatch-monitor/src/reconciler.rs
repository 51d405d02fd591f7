//! Category Reconciler — makes sure the booking category is selected and the
//! calendar has finished refreshing for it.
//!
//! Only the category picker is touched. The neighbouring "application
//! details" picker must keep whatever the site defaults it to.

use chrono::Local;
use slotwatch_core::config::{SlotWatchConfig, expand_path};
use slotwatch_core::error::{Result, SlotWatchError};
use slotwatch_core::traits::{ClickMode, Locator, Page, Presence};
use std::path::PathBuf;
use std::time::Duration;

use crate::oracle::{CheapProbe, StabilityOracle};
use crate::picker::{PickerStrategy, open_picker, picker_strategies};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryState {
    Unknown,
    AlreadySelected,
    Selecting { attempt: u32 },
    Selected { attempts: u32 },
    Failed { attempts: u32, last: String },
}

/// Successful end states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    AlreadySelected,
    Selected { attempts: u32 },
}

pub struct CategoryReconciler<'a, P: Page + ?Sized> {
    page: &'a P,
    config: &'a SlotWatchConfig,
    calendar: Locator,
    category: Locator,
    option: Locator,
    heading: Locator,
    strategies: Vec<PickerStrategy>,
}

impl<'a, P: Page + ?Sized> CategoryReconciler<'a, P> {
    pub fn new(page: &'a P, config: &'a SlotWatchConfig) -> Self {
        let target = &config.target;
        Self {
            page,
            config,
            calendar: Locator::css(&config.selectors.calendar),
            category: Locator::text(&target.category),
            option: Locator::exact_text(&target.category),
            heading: Locator::text(&target.category_heading),
            strategies: picker_strategies(&target.category_heading),
        }
    }

    fn ms(&self, ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn oracle(&self) -> StabilityOracle<'_, P> {
        StabilityOracle::new(self.page, self.calendar.clone(), &self.config.timing)
    }

    /// Drive the state machine to `AlreadySelected` or `Selected`.
    /// Exhausting the attempts yields `SelectionFailed`, which is fatal for
    /// the browser session.
    pub async fn ensure_selected(&self) -> Result<ReconcileOutcome> {
        let timing = &self.config.timing;
        let category = &self.config.target.category;

        self.page
            .wait_visible(&self.calendar, self.ms(timing.calendar_visible_ms))
            .await?;
        let baseline = self.oracle().probe().await?;

        let mut state = CategoryState::Unknown;
        loop {
            tracing::debug!("🔁 Category state: {state:?}");
            state = match state {
                CategoryState::Unknown => {
                    match self
                        .page
                        .presence(&self.category, self.ms(timing.category_grace_ms))
                        .await
                    {
                        Ok(Presence::Present) => CategoryState::AlreadySelected,
                        Ok(Presence::Ambiguous) => {
                            tracing::info!("🔁 '{category}' is in the DOM but hidden, selecting it");
                            CategoryState::Selecting { attempt: 1 }
                        }
                        Ok(Presence::Absent) => CategoryState::Selecting { attempt: 1 },
                        Err(e) => {
                            tracing::warn!("⚠️ Could not check for '{category}' ({e}), selecting it");
                            CategoryState::Selecting { attempt: 1 }
                        }
                    }
                }
                CategoryState::AlreadySelected => {
                    tracing::info!("✅ Category already shows '{category}', checking calendar is stable");
                    self.oracle()
                        .settle(self.ms(timing.already_selected_first_sample_ms))
                        .await?;
                    return Ok(ReconcileOutcome::AlreadySelected);
                }
                CategoryState::Selecting { attempt } => {
                    tracing::info!(
                        "🔁 Selecting category '{category}' (attempt {attempt}/{})",
                        timing.category_attempts
                    );
                    match self.select_once(&baseline).await {
                        Ok(()) => CategoryState::Selected { attempts: attempt },
                        Err(e) => {
                            tracing::warn!("⚠️ Attempt {attempt} failed: {e}");
                            self.capture_failure(attempt).await;
                            if attempt >= timing.category_attempts {
                                CategoryState::Failed {
                                    attempts: attempt,
                                    last: e.to_string(),
                                }
                            } else {
                                self.page.pause(self.ms(timing.retry_pause_ms)).await;
                                CategoryState::Selecting {
                                    attempt: attempt + 1,
                                }
                            }
                        }
                    }
                }
                CategoryState::Selected { attempts } => {
                    tracing::info!("✅ Category selected, calendar refreshed and stable");
                    return Ok(ReconcileOutcome::Selected { attempts });
                }
                CategoryState::Failed { attempts, last } => {
                    return Err(SlotWatchError::SelectionFailed { attempts, last });
                }
            };
        }
    }

    /// One full selection sequence: heading → open picker → option → wait
    /// for the calendar to change and settle.
    async fn select_once(&self, baseline: &CheapProbe) -> Result<()> {
        let timing = &self.config.timing;

        self.page
            .wait_visible(&self.heading, self.ms(timing.heading_visible_ms))
            .await?;
        open_picker(
            self.page,
            &self.strategies,
            self.ms(timing.candidate_visible_ms),
            self.ms(timing.click_ms),
        )
        .await?;
        self.page
            .click(&self.option, ClickMode::Normal, self.ms(timing.click_ms))
            .await?;
        self.oracle().wait_changed_then_stable(baseline).await?;
        Ok(())
    }

    fn screenshot_path(&self, attempt: u32) -> PathBuf {
        let ts = Local::now().format("%Y%m%d_%H%M%S");
        expand_path(&self.config.paths.screenshot_dir)
            .join(format!("select_fail_{ts}_{attempt}.png"))
    }

    /// Diagnostic screenshot; failures here are logged and ignored.
    async fn capture_failure(&self, attempt: u32) {
        let path = self.screenshot_path(attempt);
        match self.page.screenshot(&path).await {
            Ok(()) => tracing::info!("📸 Saved debug screenshot: {}", path.display()),
            Err(e) => tracing::warn!("⚠️ Debug screenshot failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Effect, FakePage};

    fn config(dir: &std::path::Path) -> SlotWatchConfig {
        let mut config = SlotWatchConfig::default();
        config.paths.screenshot_dir = dir.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_already_selected_only_settles() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let page = FakePage::new()
            .html(&["<cal>", "<cal>", "<cal>"])
            .show(Locator::text("VISA Application"));

        let outcome = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadySelected);
        assert!(page.clicks().is_empty());
        assert_eq!(
            page.pauses(),
            vec![Duration::from_millis(350), Duration::from_millis(450)]
        );
    }

    #[tokio::test]
    async fn test_already_selected_but_refreshing_waits_extra() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let page = FakePage::new()
            .html(&["<a>", "<b>", "<c>"])
            .show(Locator::text("VISA Application"));

        CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap();
        assert!(page.clicks().is_empty());
        assert_eq!(page.pauses().last(), Some(&Duration::from_millis(650)));
    }

    #[tokio::test]
    async fn test_selects_via_picker() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let strategies = picker_strategies("Select a category");
        let option = Locator::exact_text("VISA Application");
        let page = FakePage::new()
            .html(&["<before>"])
            .show(Locator::text("Select a category"))
            .show(strategies[0].locator.clone())
            .show(option.clone())
            .on_click(option.clone(), Effect::QueueHtml(vec!["<after>".into()]));

        let outcome = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Selected { attempts: 1 });
        let clicked: Vec<_> = page.clicks().into_iter().map(|(l, _)| l).collect();
        assert_eq!(clicked, vec![strategies[0].locator.clone(), option]);
        assert!(clicked.iter().all(|l| !l.to_string().contains("Application Details")));
        assert!(page.screenshots().is_empty());
    }

    #[tokio::test]
    async fn test_hidden_category_text_is_ambiguous_and_selects() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let strategies = picker_strategies("Select a category");
        let option = Locator::exact_text("VISA Application");
        let page = FakePage::new()
            .html(&["<before>"])
            .attach(Locator::text("VISA Application"))
            .show(Locator::text("Select a category"))
            .show(strategies[1].locator.clone())
            .show(option.clone())
            .on_click(option, Effect::QueueHtml(vec!["<after>".into()]));

        let outcome = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Selected { attempts: 1 });
    }

    #[tokio::test]
    async fn test_presence_check_error_falls_through_to_selecting() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let strategies = picker_strategies("Select a category");
        let option = Locator::exact_text("VISA Application");
        let page = FakePage::new()
            .html(&["<before>"])
            .broken(Locator::text("VISA Application"))
            .show(Locator::text("Select a category"))
            .show(strategies[0].locator.clone())
            .show(option.clone())
            .on_click(option, Effect::QueueHtml(vec!["<after>".into()]));

        let outcome = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Selected { attempts: 1 });
        assert_eq!(page.clicks().len(), 2);
    }

    #[tokio::test]
    async fn test_option_revealed_by_opening_picker() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let strategies = picker_strategies("Select a category");
        let option = Locator::exact_text("VISA Application");
        let page = FakePage::new()
            .html(&["<before>"])
            .show(Locator::text("Select a category"))
            .show(strategies[0].locator.clone())
            .on_click(strategies[0].locator.clone(), Effect::Show(option.clone()))
            .on_click(option, Effect::QueueHtml(vec!["<after>".into()]));

        let outcome = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Selected { attempts: 1 });
        assert_eq!(page.clicks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calendar_never_changes_retries_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let strategies = picker_strategies("Select a category");
        let option = Locator::exact_text("VISA Application");
        let page = FakePage::new()
            .html(&["<same>"])
            .show(Locator::text("Select a category"))
            .show(strategies[0].locator.clone())
            .show(option);

        let err = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap_err();
        assert!(matches!(err, SlotWatchError::SelectionFailed { attempts: 3, .. }));
        assert_eq!(page.screenshots().len(), 3);
    }

    #[tokio::test]
    async fn test_three_failures_three_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        // No heading: every Selecting attempt fails.
        let page = FakePage::new().html(&["<cal>"]);

        let err = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap_err();

        match err {
            SlotWatchError::SelectionFailed { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        let shots = page.screenshots();
        assert_eq!(shots.len(), 3);
        assert!(shots.iter().all(|p| p.starts_with(dir.path())));
        assert!(shots.iter().all(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("select_fail_"))
        }));
        // Pauses between attempts only.
        assert_eq!(
            page.pauses(),
            vec![Duration::from_millis(900), Duration::from_millis(900)]
        );
    }

    #[tokio::test]
    async fn test_screenshot_failure_does_not_mask_selection_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let page = FakePage::new().html(&["<cal>"]);
        page.state().fail_screenshots = true;

        let err = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap_err();
        assert!(matches!(err, SlotWatchError::SelectionFailed { .. }));
        assert_eq!(page.screenshots().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_calendar_is_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let page = FakePage::new().hide(&Locator::css(&config.selectors.calendar));
        let err = CategoryReconciler::new(&page, &config)
            .ensure_selected()
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
