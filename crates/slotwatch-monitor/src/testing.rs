//! Scripted in-memory page and sinks for unit tests.

use async_trait::async_trait;
use slotwatch_core::config::SelectorConfig;
use slotwatch_core::error::{Result, SlotWatchError};
use slotwatch_core::traits::{ClickMode, Locator, Notifier, Page, PageLauncher};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What a successful click does to the fake DOM.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Queue calendar HTML samples returned by successive reads.
    QueueHtml(Vec<String>),
    Show(Locator),
}

#[derive(Debug, Clone)]
pub struct FakeMonth {
    pub header: String,
    pub cells: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub month_label: Option<Locator>,
    pub next_month: Option<Locator>,
    pub visible: HashSet<Locator>,
    pub attached: HashSet<Locator>,
    pub failing_clicks: HashSet<Locator>,
    pub failing_modes: HashSet<ClickMode>,
    /// Lookups of these locators fail with a browser error.
    pub broken: HashSet<Locator>,
    pub on_click: HashMap<Locator, Vec<Effect>>,
    pub html_current: String,
    pub html_queue: VecDeque<String>,
    pub months: Vec<FakeMonth>,
    pub month_idx: usize,
    /// Next-month clicks in these modes do not move the calendar.
    pub stuck_modes: HashSet<ClickMode>,
    pub fail_screenshots: bool,
    pub fail_reload: bool,

    pub clicks: Vec<(Locator, ClickMode)>,
    pub pauses: Vec<Duration>,
    pub screenshots: Vec<PathBuf>,
    pub gotos: Vec<String>,
    pub reloads: usize,
    pub closed: bool,
}

/// Cloning shares the underlying state, so tests keep a handle after
/// handing the page to a launcher.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    /// A page laid out with the default selectors.
    pub fn new() -> Self {
        let selectors = SelectorConfig::default();
        let page = Self::default();
        {
            let mut s = page.state();
            s.month_label = Some(Locator::css(&selectors.month_label));
            s.next_month = Some(Locator::css(&selectors.next_month));
            s.visible.insert(Locator::css(&selectors.calendar));
            s.visible.insert(Locator::css(&selectors.month_label));
            s.visible.insert(Locator::css(&selectors.next_month));
            s.html_current = "<tr><td>initial</td></tr>".into();
        }
        page
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn show(self, locator: Locator) -> Self {
        self.state().visible.insert(locator);
        self
    }

    pub fn attach(self, locator: Locator) -> Self {
        self.state().attached.insert(locator);
        self
    }

    pub fn hide(self, locator: &Locator) -> Self {
        self.state().visible.remove(locator);
        self
    }

    pub fn fail_click(self, locator: Locator) -> Self {
        self.state().failing_clicks.insert(locator);
        self
    }

    pub fn broken(self, locator: Locator) -> Self {
        self.state().broken.insert(locator);
        self
    }

    pub fn failing_modes(self, modes: &[ClickMode]) -> Self {
        self.state().failing_modes = modes.iter().copied().collect();
        self
    }

    pub fn on_click(self, locator: Locator, effect: Effect) -> Self {
        self.state().on_click.entry(locator).or_default().push(effect);
        self
    }

    /// Calendar HTML returned by successive reads; the last one sticks.
    pub fn html(self, samples: &[&str]) -> Self {
        self.state().html_queue = samples.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn months(self, months: &[(&str, &[&str])]) -> Self {
        self.state().months = months
            .iter()
            .map(|(header, cells)| FakeMonth {
                header: header.to_string(),
                cells: cells.iter().map(|c| c.to_string()).collect(),
            })
            .collect();
        self
    }

    pub fn stuck(self, modes: &[ClickMode]) -> Self {
        self.state().stuck_modes = modes.iter().copied().collect();
        self
    }

    pub fn clicks(&self) -> Vec<(Locator, ClickMode)> {
        self.state().clicks.clone()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.state().pauses.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state().screenshots.clone()
    }
}

impl FakeState {
    fn is_visible(&self, locator: &Locator) -> bool {
        self.visible.contains(locator)
    }

    fn is_attached(&self, locator: &Locator) -> bool {
        self.visible.contains(locator) || self.attached.contains(locator)
    }

    fn current_month(&self) -> Option<&FakeMonth> {
        self.months.get(self.month_idx)
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut s = self.state();
        s.gotos.push(url.to_string());
        s.month_idx = 0;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let mut s = self.state();
        if s.fail_reload {
            return Err(SlotWatchError::Browser("target closed".into()));
        }
        s.reloads += 1;
        s.month_idx = 0;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        let s = self.state();
        if s.broken.contains(locator) {
            return Err(SlotWatchError::Browser(format!("lost {locator}")));
        }
        Ok(usize::from(s.is_attached(locator)))
    }

    async fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        if self.state().broken.contains(locator) {
            return Err(SlotWatchError::Browser(format!("lost {locator}")));
        }
        if self.state().is_visible(locator) {
            Ok(())
        } else {
            Err(SlotWatchError::timeout(format!("{locator} to be visible"), timeout))
        }
    }

    async fn inner_text(&self, locator: &Locator) -> Result<String> {
        let s = self.state();
        if s.month_label.as_ref() == Some(locator)
            && let Some(month) = s.current_month()
        {
            return Ok(month.header.clone());
        }
        Err(SlotWatchError::NotFound(locator.to_string()))
    }

    async fn inner_html(&self, _locator: &Locator) -> Result<String> {
        let mut s = self.state();
        if let Some(next) = s.html_queue.pop_front() {
            s.html_current = next;
        }
        Ok(s.html_current.clone())
    }

    async fn enclosing_texts(&self, _locator: &Locator, _ancestor_tag: &str) -> Result<Vec<String>> {
        let s = self.state();
        Ok(s.current_month().map(|m| m.cells.clone()).unwrap_or_default())
    }

    async fn click(&self, locator: &Locator, mode: ClickMode, timeout: Duration) -> Result<()> {
        let mut s = self.state();
        s.clicks.push((locator.clone(), mode));

        let reachable = match mode {
            ClickMode::Normal => s.is_visible(locator),
            ClickMode::Forced | ClickMode::Script => s.is_attached(locator),
        };
        if !reachable || s.failing_clicks.contains(locator) || s.failing_modes.contains(&mode) {
            return Err(SlotWatchError::timeout(format!("click on {locator}"), timeout));
        }

        if s.next_month.as_ref() == Some(locator) && !s.stuck_modes.contains(&mode) {
            let last = s.months.len().saturating_sub(1);
            s.month_idx = (s.month_idx + 1).min(last);
        }

        let effects = s.on_click.get(locator).cloned().unwrap_or_default();
        for effect in effects {
            match effect {
                Effect::QueueHtml(samples) => s.html_queue.extend(samples),
                Effect::Show(target) => {
                    s.visible.insert(target);
                }
            }
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let mut s = self.state();
        s.screenshots.push(path.to_path_buf());
        if s.fail_screenshots {
            return Err(SlotWatchError::Browser("screenshot failed".into()));
        }
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        self.state().pauses.push(duration);
    }

    async fn close(&self) -> Result<()> {
        self.state().closed = true;
        Ok(())
    }
}

/// Hands out clones of one fake page; fails the first `failures` launches.
pub struct FakeLauncher {
    pub page: FakePage,
    pub failures: Mutex<u32>,
    pub launches: Mutex<u32>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            failures: Mutex::new(0),
            launches: Mutex::new(0),
        }
    }
}

#[async_trait]
impl PageLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Page>> {
        *self.launches.lock().unwrap() += 1;
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(SlotWatchError::Browser("chromedriver not reachable".into()));
        }
        Ok(Box::new(self.page.clone()))
    }
}

/// Notifier that records every message; optionally fails.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        if self.fail {
            return Err(SlotWatchError::Notify("SMTP send: connection refused".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}
