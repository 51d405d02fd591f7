//! Scan data model: month keys, available dates, per-cycle results and the
//! signature used for change detection.

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;
use slotwatch_core::error::{Result, SlotWatchError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})年(\d{1,2})月").expect("valid month header regex"));

/// A calendar month in the site's display format (`2025年05月`).
/// Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthLabel {
    pub year: i32,
    pub month: u32,
}

impl MonthLabel {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(SlotWatchError::Parse(format!("Month out of range: {month}")));
        }
        Ok(Self { year, month })
    }

    /// Parse the calendar header (e.g. `2025年 5月`). Whitespace is ignored.
    pub fn parse(header: &str) -> Result<Self> {
        let compact: String = header.chars().filter(|c| !c.is_whitespace()).collect();
        let caps = HEADER_RE.captures(&compact).ok_or_else(|| {
            SlotWatchError::Parse(format!("Cannot parse year/month from header: {compact}"))
        })?;
        let year = caps[1]
            .parse()
            .map_err(|e| SlotWatchError::Parse(format!("Bad year in header {compact}: {e}")))?;
        let month = caps[2]
            .parse()
            .map_err(|e| SlotWatchError::Parse(format!("Bad month in header {compact}: {e}")))?;
        Self::new(year, month)
    }

    /// The date for `day` in this month, if it exists.
    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}年{:02}月", self.year, self.month)
    }
}

/// Full English weekday name.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// A day carrying an availability marker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AvailableDate {
    pub date: NaiveDate,
    pub weekday: &'static str,
}

impl AvailableDate {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            weekday: weekday_name(date.weekday()),
        }
    }

    /// ISO-8601 calendar date.
    pub fn iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// One poll cycle's availability, keyed by month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    months: BTreeMap<MonthLabel, BTreeSet<AvailableDate>>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a month. Re-reading a month replaces its dates.
    pub fn insert(&mut self, month: MonthLabel, dates: BTreeSet<AvailableDate>) {
        self.months.insert(month, dates);
    }

    pub fn months(&self) -> impl Iterator<Item = (&MonthLabel, &BTreeSet<AvailableDate>)> {
        self.months.iter()
    }

    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn get(&self, month: &MonthLabel) -> Option<&BTreeSet<AvailableDate>> {
        self.months.get(month)
    }

    pub fn has_availability(&self) -> bool {
        self.months.values().any(|dates| !dates.is_empty())
    }

    pub fn total(&self) -> usize {
        self.months.values().map(BTreeSet::len).sum()
    }

    pub fn signature(&self) -> AvailabilitySignature {
        AvailabilitySignature(
            self.months
                .iter()
                .map(|(month, dates)| (*month, dates.iter().map(|d| d.date).collect()))
                .collect(),
        )
    }
}

/// Canonical, order-stable form of a [`ScanResult`]; equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AvailabilitySignature(Vec<(MonthLabel, Vec<NaiveDate>)>);
