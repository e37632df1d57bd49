//! Turns fetched samples into the immutable [`ReportContext`].
//!
//! Pure and deterministic: percent change is computed in exact decimal
//! arithmetic, ranked lists are merged, ordered and capped here, and every
//! unavailable sample becomes an explicit placeholder.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use mktpulse_core::{MetricSample, PeriodWindows, RankedEntry, Unavailable};
use mktpulse_sources::ReportSamples;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Period-over-period change in percent, rounded to one decimal place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PercentChange(Decimal);

impl PercentChange {
    /// `(current - previous) / previous * 100`, rounded half away from zero.
    /// A zero baseline yields 0 rather than dividing.
    #[must_use]
    pub fn between(current: u64, previous: u64) -> Self {
        if previous == 0 {
            return Self(Decimal::ZERO);
        }
        let current = Decimal::from(current);
        let previous = Decimal::from(previous);
        let pct = (current - previous) / previous * Decimal::ONE_HUNDRED;
        Self(pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
    }

    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for PercentChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_sign_negative() && !self.0.is_zero() {
            write!(f, "{:.1}%", self.0)
        } else {
            write!(f, "+{:.1}%", self.0.abs())
        }
    }
}

/// A report value, or the placeholder standing in for an unavailable source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Field<T> {
    Value(T),
    Placeholder(Unavailable),
}

impl<T> Field<T> {
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            Field::Placeholder(_) => None,
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Field::Placeholder(_))
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Value(v) => Field::Value(f(v)),
            Field::Placeholder(u) => Field::Placeholder(u),
        }
    }
}

impl<T> From<MetricSample<T>> for Field<T> {
    fn from(sample: MetricSample<T>) -> Self {
        match sample.outcome {
            Ok(v) => Field::Value(v),
            Err(u) => Field::Placeholder(u),
        }
    }
}

impl<T> From<Result<T, Unavailable>> for Field<T> {
    fn from(outcome: Result<T, Unavailable>) -> Self {
        match outcome {
            Ok(v) => Field::Value(v),
            Err(u) => Field::Placeholder(u),
        }
    }
}

impl fmt::Display for Field<u64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => write!(f, "{v}"),
            Field::Placeholder(_) => write!(f, "N/A"),
        }
    }
}

impl fmt::Display for Field<PercentChange> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => write!(f, "{v}"),
            Field::Placeholder(_) => write!(f, "N/A"),
        }
    }
}

impl fmt::Display for Field<Vec<RankedEntry>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(entries) if entries.is_empty() => write!(f, "none recorded"),
            Field::Value(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{} ({})", e.key, e.count))
                    .collect();
                write!(f, "{}", parts.join(", "))
            }
            Field::Placeholder(_) => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialLine {
    pub platform: String,
    pub count: Field<u64>,
}

/// Everything the narrative is written from. Built once per run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub windows: PeriodWindows,
    pub users: Field<u64>,
    pub users_change: Field<PercentChange>,
    pub intent_total: Field<u64>,
    pub top_countries: Field<Vec<RankedEntry>>,
    pub top_channels: Field<Vec<RankedEntry>>,
    pub app_clicks: Field<u64>,
    pub social: Vec<SocialLine>,
}

impl ReportContext {
    /// Number of fields rendered as placeholders.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        [
            self.users.is_placeholder(),
            self.users_change.is_placeholder(),
            self.intent_total.is_placeholder(),
            self.top_countries.is_placeholder(),
            self.top_channels.is_placeholder(),
            self.app_clicks.is_placeholder(),
        ]
        .into_iter()
        .chain(self.social.iter().map(|s| s.count.is_placeholder()))
        .filter(|p| *p)
        .count()
    }
}

/// Merges duplicate keys by summing, orders by count descending then key
/// ascending, and keeps the first `cap`.
#[must_use]
pub fn rank_entries(entries: Vec<RankedEntry>, cap: usize) -> Vec<RankedEntry> {
    let mut merged: BTreeMap<String, u64> = BTreeMap::new();
    for entry in entries {
        *merged.entry(entry.key).or_insert(0) += entry.count;
    }
    let mut ranked: Vec<RankedEntry> = merged
        .into_iter()
        .map(|(key, count)| RankedEntry { key, count })
        .collect();
    ranked.sort_by(|a, b| (Reverse(a.count), &a.key).cmp(&(Reverse(b.count), &b.key)));
    ranked.truncate(cap);
    ranked
}

/// Builds the report context from one run's samples.
#[must_use]
pub fn assemble(samples: ReportSamples, top_n: usize) -> ReportContext {
    let users_change = match (&samples.users_current.outcome, &samples.users_comparison.outcome) {
        (Ok(current), Ok(previous)) => Field::Value(PercentChange::between(*current, *previous)),
        (Err(u), _) | (_, Err(u)) => Field::Placeholder(u.clone()),
    };

    ReportContext {
        windows: samples.windows,
        users: samples.users_current.into(),
        users_change,
        intent_total: samples.intent_total.into(),
        top_countries: Field::from(samples.intent_by_country).map(|e| rank_entries(e, top_n)),
        top_channels: Field::from(samples.channels).map(|e| rank_entries(e, top_n)),
        app_clicks: samples.app_clicks.into(),
        social: samples
            .social
            .into_iter()
            .map(|s| SocialLine {
                platform: s.platform,
                count: s.count.into(),
            })
            .collect(),
    }
}

#[cfg(test)]
#[path = "assemble_test.rs"]
mod tests;
