//! SlotWatch configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SlotWatchError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotWatchConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub delays: DelayConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl SlotWatchConfig {
    /// Load config from the default path (~/.slotwatch/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SlotWatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SlotWatchError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.target.url.trim().is_empty() {
            return Err(SlotWatchError::Config("target.url is empty".into()));
        }
        if self.target.category.trim().is_empty() {
            return Err(SlotWatchError::Config("target.category is empty".into()));
        }
        if self.timing.category_attempts == 0 {
            return Err(SlotWatchError::Config(
                "timing.category_attempts must be at least 1".into(),
            ));
        }
        self.delays.validate()
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SlotWatchError::Config(format!("Failed to serialize config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the SlotWatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".slotwatch")
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// What to watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Booking category that must be selected before reading the calendar.
    #[serde(default = "default_category")]
    pub category: String,
    /// Heading text next to the category picker.
    #[serde(default = "default_category_heading")]
    pub category_heading: String,
    /// Months scanned after the current one.
    #[serde(default = "default_scan_next_months")]
    pub scan_next_months: u32,
}

fn default_url() -> String { "https://toronto.rsvsys.jp/reservations/calendar".into() }
fn default_category() -> String { "VISA Application".into() }
fn default_category_heading() -> String { "Select a category".into() }
fn default_scan_next_months() -> u32 { 3 }

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            category: default_category(),
            category_heading: default_category_heading(),
            scan_next_months: default_scan_next_months(),
        }
    }
}

/// CSS selectors for the calendar widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_calendar")]
    pub calendar: String,
    #[serde(default = "default_calendar_body")]
    pub calendar_body: String,
    #[serde(default = "default_month_label")]
    pub month_label: String,
    #[serde(default = "default_next_month")]
    pub next_month: String,
    /// Substring of the `src` attribute of availability marker images.
    #[serde(default = "default_marker_src")]
    pub marker_src: String,
}

fn default_calendar() -> String { "table.sc_cal_month".into() }
fn default_calendar_body() -> String { "tbody.sc_cal_month_tbody".into() }
fn default_month_label() -> String { ".c_cal_navex_date .date".into() }
fn default_next_month() -> String { "a.next01.js_change_date".into() }
fn default_marker_src() -> String { "icon_circle.svg".into() }

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            calendar: default_calendar(),
            calendar_body: default_calendar_body(),
            month_label: default_month_label(),
            next_month: default_next_month(),
            marker_src: default_marker_src(),
        }
    }
}

/// Page-interaction timings, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub calendar_visible_ms: u64,
    pub change_timeout_ms: u64,
    pub category_grace_ms: u64,
    pub heading_visible_ms: u64,
    pub candidate_visible_ms: u64,
    pub click_ms: u64,
    pub label_visible_ms: u64,
    pub nav_settle_ms: u64,
    pub initial_settle_ms: u64,
    pub reload_settle_ms: u64,
    pub retry_pause_ms: u64,
    pub category_attempts: u32,
    pub already_selected_first_sample_ms: u64,
    pub changed_first_sample_ms: u64,
    pub sample_gap_ms: u64,
    pub extra_settle_ms: u64,
    pub probe_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            calendar_visible_ms: 12_000,
            change_timeout_ms: 12_000,
            category_grace_ms: 1_200,
            heading_visible_ms: 12_000,
            candidate_visible_ms: 2_500,
            click_ms: 5_000,
            label_visible_ms: 8_000,
            nav_settle_ms: 700,
            initial_settle_ms: 1_400,
            reload_settle_ms: 1_000,
            retry_pause_ms: 900,
            category_attempts: 3,
            already_selected_first_sample_ms: 350,
            changed_first_sample_ms: 300,
            sample_gap_ms: 450,
            extra_settle_ms: 650,
            probe_poll_ms: 100,
        }
    }
}

/// Mean / standard deviation of one sleep policy, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayPolicy {
    pub mean_secs: f64,
    pub std_secs: f64,
}

impl DelayPolicy {
    pub const fn new(mean_secs: f64, std_secs: f64) -> Self {
        Self { mean_secs, std_secs }
    }
}

/// The three randomized sleep policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default = "default_idle")]
    pub idle: DelayPolicy,
    #[serde(default = "default_after_notify")]
    pub after_notify: DelayPolicy,
    #[serde(default = "default_crash")]
    pub crash: DelayPolicy,
    /// Uniform jitter added on top of the gaussian sample (± seconds).
    #[serde(default = "default_jitter")]
    pub jitter_secs: f64,
    /// No delay is ever shorter than this.
    #[serde(default = "default_floor")]
    pub floor_secs: u64,
}

fn default_idle() -> DelayPolicy { DelayPolicy::new(90.0, 10.0) }
fn default_after_notify() -> DelayPolicy { DelayPolicy::new(600.0, 12.0) }
fn default_crash() -> DelayPolicy { DelayPolicy::new(45.0, 10.0) }
fn default_jitter() -> f64 { 2.0 }
fn default_floor() -> u64 { 5 }

impl DelayConfig {
    /// Every duration must be a finite, non-negative number of seconds.
    pub fn validate(&self) -> Result<()> {
        let policies = [
            ("idle", self.idle),
            ("after_notify", self.after_notify),
            ("crash", self.crash),
        ];
        for (name, policy) in policies {
            check_secs(&format!("delays.{name}.mean_secs"), policy.mean_secs)?;
            check_secs(&format!("delays.{name}.std_secs"), policy.std_secs)?;
        }
        check_secs("delays.jitter_secs", self.jitter_secs)
    }
}

fn check_secs(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SlotWatchError::Config(format!(
            "{key} must be a finite, non-negative number (got {value})"
        )))
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            idle: default_idle(),
            after_notify: default_after_notify(),
            crash: default_crash(),
            jitter_secs: default_jitter(),
            floor_secs: default_floor(),
        }
    }
}

/// WebDriver / Chrome session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Persistent Chrome profile, reused across restarts.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_webdriver_url() -> String { "http://localhost:9515".into() }
fn default_profile_dir() -> String { "~/.slotwatch/chrome-profile".into() }
fn default_window_width() -> u32 { 1400 }
fn default_window_height() -> u32 { 900 }

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            profile_dir: default_profile_dir(),
            headless: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

/// Filesystem outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,
}

fn default_log_dir() -> String { "~/.slotwatch/logs".into() }
fn default_screenshot_dir() -> String { "~/.slotwatch/logs/screenshots".into() }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

impl PathsConfig {
    pub fn log_file(&self) -> PathBuf {
        expand_path(&self.log_dir).join("slotwatch.log")
    }
}

/// Outgoing email settings. Credentials live in [`crate::secrets::Secrets`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Optional TOML file with sender/recipient credentials.
    #[serde(default)]
    pub secrets_file: Option<String>,
}

fn default_smtp_host() -> String { "smtp.qq.com".into() }
fn default_smtp_port() -> u16 { 465 }
fn default_display_name() -> String { "Visa Watcher".into() }
fn default_subject() -> String { "Japan Visa Appointment Availability (Toronto)".into() }

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            display_name: default_display_name(),
            subject: default_subject(),
            secrets_file: None,
        }
    }
}
