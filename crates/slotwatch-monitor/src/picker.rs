//! Picker-opening strategies — an ordered fallback chain.
//!
//! The category picker has no stable selector; it is "the clickable thing
//! after the heading". Strategies are tried in order, each with its own short
//! timeout, and the first successful click wins.

use slotwatch_core::error::{Result, SlotWatchError};
use slotwatch_core::traits::{ClickMode, Locator, Page};
use std::time::Duration;

/// One way of finding the control that opens a picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerStrategy {
    pub name: &'static str,
    pub locator: Locator,
    /// Wait for visibility (with the candidate timeout) before clicking.
    pub wait_visible: bool,
}

/// Strategies for the picker that sits under `heading`, most specific first.
/// Only controls following or enclosing that heading are considered.
pub fn picker_strategies(heading: &str) -> Vec<PickerStrategy> {
    let heading = format!(
        "({})[1]",
        Locator::text(heading).as_xpath().unwrap_or_default()
    );
    vec![
        PickerStrategy {
            name: "sibling link",
            locator: Locator::xpath(format!("{heading}/following::a[1]")),
            wait_visible: true,
        },
        PickerStrategy {
            name: "role button",
            locator: Locator::xpath(format!("{heading}/following::*[@role='button'][1]")),
            wait_visible: true,
        },
        PickerStrategy {
            name: "button",
            locator: Locator::xpath(format!("{heading}/following::button[1]")),
            wait_visible: true,
        },
        PickerStrategy {
            name: "heading block",
            locator: Locator::xpath(format!(
                "({heading}/ancestor::*[self::div or self::section][1]\
                 //*[self::a or self::button or @role='button'])[1]"
            )),
            wait_visible: false,
        },
    ]
}

/// Click the first strategy that works. Returns its index, or every
/// strategy's failure folded into one error.
pub async fn open_picker<P: Page + ?Sized>(
    page: &P,
    strategies: &[PickerStrategy],
    visible_timeout: Duration,
    click_timeout: Duration,
) -> Result<usize> {
    let mut failures = Vec::with_capacity(strategies.len());

    for (idx, strategy) in strategies.iter().enumerate() {
        let attempt = async {
            if strategy.wait_visible {
                page.wait_visible(&strategy.locator, visible_timeout).await?;
            }
            page.click(&strategy.locator, ClickMode::Normal, click_timeout)
                .await
        };
        match attempt.await {
            Ok(()) => {
                tracing::debug!("🖱️ Picker opened via {}", strategy.name);
                return Ok(idx);
            }
            Err(e) => {
                tracing::debug!("⏭️ Picker strategy '{}' failed: {e}", strategy.name);
                failures.push(format!("{}: {e}", strategy.name));
            }
        }
    }

    Err(SlotWatchError::NotFound(format!(
        "no picker control could be opened ({})",
        failures.join("; ")
    )))
}
