//! Browser capability — the page operations the monitor relies on.
//!
//! Implementations drive a real browser (see `slotwatch-browser`) or a
//! scripted fake in tests. All operations are sequential suspension points:
//! callers never issue two page operations concurrently.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// How to find an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    /// Element whose own text contains (or, if `exact`, equals) `text`.
    Text { text: String, exact: bool },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: true,
        }
    }

    /// Equivalent XPath expression. CSS locators have none.
    pub fn as_xpath(&self) -> Option<String> {
        match self {
            Self::Css(_) => None,
            Self::XPath(expr) => Some(expr.clone()),
            Self::Text { text, exact: true } => Some(format!(
                "//*[normalize-space(text())={}]",
                xpath_literal(text)
            )),
            Self::Text { text, exact: false } => Some(format!(
                "//*[contains(normalize-space(text()),{})]",
                xpath_literal(text)
            )),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={s}"),
            Locator::XPath(s) => write!(f, "xpath={s}"),
            Locator::Text { text, exact: true } => write!(f, "text=\"{text}\""),
            Locator::Text { text, exact: false } => write!(f, "text~\"{text}\""),
        }
    }
}

/// Quote a string as an XPath 1.0 literal, using `concat()` when it holds
/// both quote characters.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Click strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickMode {
    /// Wait for the element to be visible, then click.
    Normal,
    /// Scroll into view and click without waiting for visibility.
    Forced,
    /// Dispatch `element.click()` from page script.
    Script,
}

/// Result of an explicit existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Visible within the grace period.
    Present,
    /// In the DOM but not visible within the grace period.
    Ambiguous,
    /// Not in the DOM at all.
    Absent,
}

/// A single browser page.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for the DOM content to be loaded.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Reload the current page; resets any in-page selection state.
    async fn reload(&self) -> Result<()>;

    /// Number of elements matching `locator`.
    async fn count(&self, locator: &Locator) -> Result<usize>;

    /// Wait until the first match is visible. Fails with `Timeout`.
    async fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<()>;

    /// Rendered text of the first match.
    async fn inner_text(&self, locator: &Locator) -> Result<String>;

    /// Inner HTML of the first match.
    async fn inner_html(&self, locator: &Locator) -> Result<String>;

    /// For every match, the text of its nearest `ancestor_tag` ancestor.
    /// One entry per match, in document order, duplicates kept.
    async fn enclosing_texts(&self, locator: &Locator, ancestor_tag: &str) -> Result<Vec<String>>;

    /// Click the first match.
    async fn click(&self, locator: &Locator, mode: ClickMode, timeout: Duration) -> Result<()>;

    /// Save a screenshot as PNG.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Timed no-op pause.
    async fn pause(&self, duration: Duration);

    /// Release the browser session.
    async fn close(&self) -> Result<()>;

    /// Explicit existence check used instead of treating a timeout as a signal.
    async fn presence(&self, locator: &Locator, grace: Duration) -> Result<Presence> {
        match self.wait_visible(locator, grace).await {
            Ok(()) => Ok(Presence::Present),
            Err(e) if e.is_timeout() => {
                if self.count(locator).await? > 0 {
                    Ok(Presence::Ambiguous)
                } else {
                    Ok(Presence::Absent)
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// Opens fresh pages bound to the persistent browser profile.
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Page>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_locator_xpath() {
        assert_eq!(
            Locator::exact_text("VISA Application").as_xpath().unwrap(),
            "//*[normalize-space(text())='VISA Application']"
        );
        assert_eq!(
            Locator::text("Select a category").as_xpath().unwrap(),
            "//*[contains(normalize-space(text()),'Select a category')]"
        );
        assert!(Locator::css("table").as_xpath().is_none());
    }

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal("a'b\"c"),
            "concat('a', \"'\", 'b\"c')"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Locator::css("a.next").to_string(), "css=a.next");
        assert_eq!(Locator::exact_text("X").to_string(), "text=\"X\"");
    }
}
