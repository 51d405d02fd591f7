//! Change detection and the plain-text availability report.

use chrono::NaiveDateTime;
use std::fmt::Write;

use crate::model::{AvailabilitySignature, ScanResult};

/// Body used when a scan found nothing anywhere in the window.
pub const NO_AVAILABILITY: &str = "No available dates.";

/// `true` when `current` differs from the last notified signature, or when
/// nothing has been notified yet.
pub fn diff(current: &AvailabilitySignature, previous: Option<&AvailabilitySignature>) -> bool {
    previous != Some(current)
}

/// Render a scan for humans. Months are in calendar order, dates ascending;
/// months without dates are left out.
pub fn format_report(result: &ScanResult, checked_at: NaiveDateTime, url: &str) -> String {
    if !result.has_availability() {
        return NO_AVAILABILITY.to_string();
    }

    let mut out = String::from("Available appointment dates:\n\n");
    for (month, dates) in result.months() {
        if dates.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{month}:");
        for d in dates {
            let _ = writeln!(out, "  - {} ({})", d.iso(), d.weekday);
        }
        out.push('\n');
    }
    let _ = writeln!(out, "Total: {}", result.total());
    let _ = writeln!(out, "Checked at: {}", checked_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = write!(out, "Page: {url}");
    out
}
