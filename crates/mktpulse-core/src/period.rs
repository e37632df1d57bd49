//! Report-window arithmetic.
//!
//! A run is anchored on "today". The weekly cadence reports on the last full
//! Monday..Sunday week before today's week; the monthly cadence reports on the
//! calendar month before today's month. Both compare against the block of the
//! same kind immediately preceding the report window.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reporting period type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    Monthly,
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Weekly => write!(f, "weekly"),
            Cadence::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown cadence '{0}'; expected 'weekly' or 'monthly'")]
pub struct ParseCadenceError(String);

impl FromStr for Cadence {
    type Err = ParseCadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(ParseCadenceError(other.to_string())),
        }
    }
}

/// Inclusive date range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReportWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportWindow {
    /// Returns `None` when `start` is after `end`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, counting both bounds.
    #[must_use]
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// `YYYY-MM-DD` form of the start bound, as analytics APIs expect.
    #[must_use]
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    #[must_use]
    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_iso(), self.end_iso())
    }
}

/// The report window and the window it is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodWindows {
    pub cadence: Cadence,
    pub report: ReportWindow,
    pub comparison: ReportWindow,
}

impl PeriodWindows {
    #[must_use]
    pub fn for_cadence(cadence: Cadence, today: NaiveDate) -> Self {
        match cadence {
            Cadence::Weekly => Self::weekly(today),
            Cadence::Monthly => Self::monthly(today),
        }
    }

    /// Last full Monday..Sunday week strictly before the week containing `today`,
    /// compared against the 7 days immediately before it.
    #[must_use]
    pub fn weekly(today: NaiveDate) -> Self {
        let offset = i64::from(today.weekday().num_days_from_monday()) + 1;
        let end = today - Duration::days(offset);
        let report = seven_days_ending(end);
        let comparison = seven_days_ending(report.start - Duration::days(1));
        Self {
            cadence: Cadence::Weekly,
            report,
            comparison,
        }
    }

    /// Calendar month before the month containing `today`, compared against
    /// the full calendar month before that.
    #[must_use]
    pub fn monthly(today: NaiveDate) -> Self {
        let report = month_ending(first_of_month(today) - Duration::days(1));
        let comparison = month_ending(report.start - Duration::days(1));
        Self {
            cadence: Cadence::Monthly,
            report,
            comparison,
        }
    }
}

fn seven_days_ending(end: NaiveDate) -> ReportWindow {
    ReportWindow {
        start: end - Duration::days(6),
        end,
    }
}

fn month_ending(last_day: NaiveDate) -> ReportWindow {
    ReportWindow {
        start: first_of_month(last_day),
        end: last_day,
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// Spreadsheet row key: day/month/year without zero padding (`5/1/2026`).
#[must_use]
pub fn sheet_date_key(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

/// Reads a row key written by [`sheet_date_key`]. Zero-padded parts are
/// accepted.
#[must_use]
pub fn parse_sheet_date_key(key: &str) -> Option<NaiveDate> {
    let mut parts = key.trim().split('/');
    let day = parts.next()?.trim().parse().ok()?;
    let month = parts.next()?.trim().parse().ok()?;
    let year = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
#[path = "period_test.rs"]
mod tests;
