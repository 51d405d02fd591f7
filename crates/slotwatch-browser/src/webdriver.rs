//! WebDriver page — fantoccini client talking to chromedriver.
//!
//! Chrome runs with a persistent `--user-data-dir` so cookies and consent
//! banners survive restarts. Page loads use the `eager` strategy
//! (DOMContentLoaded), matching how the calendar is rendered client-side.

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};
use slotwatch_core::config::{BrowserConfig, expand_path};
use slotwatch_core::error::{Result, SlotWatchError};
use slotwatch_core::traits::{ClickMode, Locator, Page, PageLauncher};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Locate the first element (CSS or XPath) from page script.
const RESOLVE_JS: &str = r#"
const [kind, query] = arguments;
const el = kind === 'css'
    ? document.querySelector(query)
    : document.evaluate(query, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
"#;

/// WebDriver-side form of a [`Locator`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Query {
    Css(String),
    XPath(String),
}

impl Query {
    fn from_locator(locator: &Locator) -> Self {
        match locator {
            Locator::Css(sel) => Query::Css(sel.clone()),
            other => Query::XPath(other.as_xpath().unwrap_or_default()),
        }
    }

    fn as_wd(&self) -> fantoccini::Locator<'_> {
        match self {
            Query::Css(s) => fantoccini::Locator::Css(s),
            Query::XPath(s) => fantoccini::Locator::XPath(s),
        }
    }

    fn script_args(&self) -> Vec<Value> {
        match self {
            Query::Css(s) => vec![json!("css"), json!(s)],
            Query::XPath(s) => vec![json!("xpath"), json!(s)],
        }
    }
}

fn browser_err(e: CmdError) -> SlotWatchError {
    SlotWatchError::Browser(e.to_string())
}

/// Chrome capabilities for a persistent-profile session.
pub fn chrome_capabilities(config: &BrowserConfig, profile_dir: &Path) -> Map<String, Value> {
    let mut args = vec![
        format!("--user-data-dir={}", profile_dir.display()),
        format!("--window-size={},{}", config.window_width, config.window_height),
    ];
    if config.headless {
        args.push("--headless=new".into());
    }

    let mut caps = Map::new();
    caps.insert("browserName".into(), json!("chrome"));
    caps.insert("pageLoadStrategy".into(), json!("eager"));
    caps.insert("goog:chromeOptions".into(), json!({ "args": args }));
    caps
}

/// A page in a chromedriver-controlled Chrome window.
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    /// Start a new WebDriver session bound to the configured profile.
    pub async fn connect(config: &BrowserConfig) -> Result<Self> {
        let profile = expand_path(&config.profile_dir);
        std::fs::create_dir_all(&profile)?;

        tracing::info!(
            "🌐 Launching Chrome via {} (profile: {})",
            config.webdriver_url,
            profile.display()
        );

        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities(config, &profile));
        let client = builder
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| SlotWatchError::Browser(format!("WebDriver session: {e}")))?;

        Ok(Self { client })
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>> {
        let query = Query::from_locator(locator);
        self.client
            .find_all(query.as_wd())
            .await
            .map_err(browser_err)
    }

    async fn first(&self, locator: &Locator) -> Result<Element> {
        self.find_all(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SlotWatchError::NotFound(locator.to_string()))
    }

    async fn first_visible(&self, locator: &Locator) -> Result<Option<Element>> {
        for el in self.find_all(locator).await? {
            if el.is_displayed().await.unwrap_or(false) {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }

    /// Run `body` against the element resolved by `locator` in page script.
    async fn run_on_element(&self, locator: &Locator, body: &str) -> Result<bool> {
        let query = Query::from_locator(locator);
        let script = format!("{RESOLVE_JS}\nif (!el) return false;\n{body}\nreturn true;");
        let found = self
            .client
            .execute(&script, query.script_args())
            .await
            .map_err(browser_err)?;
        Ok(found.as_bool().unwrap_or(false))
    }

    async fn click_visible(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut last_err = None;
        loop {
            match self.first_visible(locator).await? {
                Some(el) => match el.click().await {
                    Ok(()) => return Ok(()),
                    Err(e) => last_err = Some(e.to_string()),
                },
                None => last_err = Some("not visible".into()),
            }
            if Instant::now() >= deadline {
                let what = match last_err {
                    Some(reason) => format!("click on {locator} ({reason})"),
                    None => format!("click on {locator}"),
                };
                return Err(SlotWatchError::timeout(what, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.client.goto(url).await.map_err(browser_err)
    }

    async fn reload(&self) -> Result<()> {
        self.client.refresh().await.map_err(browser_err)
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(self.find_all(locator).await?.len())
    }

    async fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.first_visible(locator).await?.is_some() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SlotWatchError::timeout(format!("{locator} to be visible"), timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn inner_text(&self, locator: &Locator) -> Result<String> {
        self.first(locator).await?.text().await.map_err(browser_err)
    }

    async fn inner_html(&self, locator: &Locator) -> Result<String> {
        self.first(locator).await?.html(true).await.map_err(browser_err)
    }

    async fn enclosing_texts(&self, locator: &Locator, ancestor_tag: &str) -> Result<Vec<String>> {
        let ancestor = format!("ancestor::{ancestor_tag}[1]");
        let mut texts = Vec::new();
        for el in self.find_all(locator).await? {
            match el.find(fantoccini::Locator::XPath(&ancestor)).await {
                Ok(cell) => texts.push(cell.text().await.map_err(browser_err)?),
                Err(e) if e.is_no_such_element() => texts.push(String::new()),
                Err(e) => return Err(browser_err(e)),
            }
        }
        Ok(texts)
    }

    async fn click(&self, locator: &Locator, mode: ClickMode, timeout: Duration) -> Result<()> {
        match mode {
            ClickMode::Normal => self.click_visible(locator, timeout).await,
            ClickMode::Forced => {
                let el = self.first(locator).await?;
                self.run_on_element(locator, "el.scrollIntoView({block: 'center'});")
                    .await?;
                tokio::time::timeout(timeout, el.click())
                    .await
                    .map_err(|_| SlotWatchError::timeout(format!("forced click on {locator}"), timeout))?
                    .map_err(browser_err)
            }
            ClickMode::Script => {
                if self.run_on_element(locator, "el.click();").await? {
                    Ok(())
                } else {
                    Err(SlotWatchError::NotFound(locator.to_string()))
                }
            }
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let png = self.client.screenshot().await.map_err(browser_err)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, png).await?;
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("🧹 Closing browser session");
        self.client.clone().close().await.map_err(browser_err)
    }
}

/// Launches [`WebDriverPage`]s from a fixed browser config.
pub struct WebDriverLauncher {
    config: BrowserConfig,
}

impl WebDriverLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn Page>> {
        Ok(Box::new(WebDriverPage::connect(&self.config).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_persistent_profile() {
        let config = BrowserConfig::default();
        let caps = chrome_capabilities(&config, Path::new("/tmp/profile"));
        assert_eq!(caps["pageLoadStrategy"], "eager");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--user-data-dir=/tmp/profile"));
        assert!(args.iter().any(|a| a == "--window-size=1400,900"));
        assert!(!args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn test_capabilities_headless() {
        let config = BrowserConfig {
            headless: true,
            ..BrowserConfig::default()
        };
        let caps = chrome_capabilities(&config, Path::new("/tmp/p"));
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn test_query_from_text_locator() {
        let q = Query::from_locator(&Locator::exact_text("VISA Application"));
        assert_eq!(
            q,
            Query::XPath("//*[normalize-space(text())='VISA Application']".into())
        );
        assert_eq!(
            Query::from_locator(&Locator::css("a.next")).script_args(),
            vec![json!("css"), json!("a.next")]
        );
    }
}
