//! Metric samples produced by the fetch layer.

use std::fmt;

use serde::Serialize;

/// Why a source produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The spreadsheet key, row, or API item was absent.
    NotFound,
    /// The payload or scraped text did not match the expected shape.
    ParseFailure,
    /// Network failure, timeout, or a non-auth error status.
    TransportError,
    /// The credential was rejected.
    AuthError,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NotFound => write!(f, "not_found"),
            UnavailableReason::ParseFailure => write!(f, "parse_failure"),
            UnavailableReason::TransportError => write!(f, "transport_error"),
            UnavailableReason::AuthError => write!(f, "auth_error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unavailable {
    pub reason: UnavailableReason,
    pub detail: String,
}

impl Unavailable {
    #[must_use]
    pub fn new(reason: UnavailableReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

/// Which of the two period windows a scalar was measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowRole {
    Current,
    Comparison,
}

/// Identifies one configured metric source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    ActiveUsers(WindowRole),
    IntentTotal,
    IntentByCountry,
    Channels,
    AppClicks,
    /// Social count read back from the tracking spreadsheet.
    SheetSocial(String),
    /// Follower count scraped from a rendered profile page.
    ScrapedFollowers(String),
    /// Subscriber count from the video platform's channel statistics.
    ChannelSubscribers(String),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::ActiveUsers(WindowRole::Current) => write!(f, "analytics.active_users"),
            SourceId::ActiveUsers(WindowRole::Comparison) => {
                write!(f, "analytics.active_users.comparison")
            }
            SourceId::IntentTotal => write!(f, "analytics.intent_total"),
            SourceId::IntentByCountry => write!(f, "analytics.intent_by_country"),
            SourceId::Channels => write!(f, "analytics.channels"),
            SourceId::AppClicks => write!(f, "analytics.app_clicks"),
            SourceId::SheetSocial(platform) => write!(f, "sheet.{}", platform.to_lowercase()),
            SourceId::ScrapedFollowers(platform) => {
                write!(f, "scrape.{}", platform.to_lowercase())
            }
            SourceId::ChannelSubscribers(platform) => {
                write!(f, "channel.{}", platform.to_lowercase())
            }
        }
    }
}

/// One source's result: a value, or the reason it could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSample<T> {
    pub source: SourceId,
    pub outcome: Result<T, Unavailable>,
}

impl<T> MetricSample<T> {
    #[must_use]
    pub fn available(source: SourceId, value: T) -> Self {
        Self {
            source,
            outcome: Ok(value),
        }
    }

    #[must_use]
    pub fn unavailable(
        source: SourceId,
        reason: UnavailableReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source,
            outcome: Err(Unavailable::new(reason, detail)),
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    #[must_use]
    pub fn unavailable_reason(&self) -> Option<UnavailableReason> {
        self.outcome.as_ref().err().map(|u| u.reason)
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A dimension value paired with its count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
}

impl RankedEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

/// Follower or engagement count for one social platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialSnapshot {
    pub platform: String,
    pub count: Result<u64, Unavailable>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ids_render_stable_names() {
        assert_eq!(
            SourceId::ActiveUsers(WindowRole::Comparison).to_string(),
            "analytics.active_users.comparison"
        );
        assert_eq!(
            SourceId::ScrapedFollowers("Medium".to_string()).to_string(),
            "scrape.medium"
        );
    }

    #[test]
    fn sample_accessors_reflect_outcome() {
        let ok = MetricSample::available(SourceId::AppClicks, 12_u64);
        assert_eq!(ok.value(), Some(&12));
        assert!(ok.unavailable_reason().is_none());

        let missing: MetricSample<u64> =
            MetricSample::unavailable(SourceId::IntentTotal, UnavailableReason::AuthError, "401");
        assert!(!missing.is_available());
        assert_eq!(
            missing.unavailable_reason(),
            Some(UnavailableReason::AuthError)
        );
    }

    #[test]
    fn unavailable_serializes_reason_in_snake_case() {
        let json = serde_json::to_value(Unavailable::new(
            UnavailableReason::ParseFailure,
            "no match",
        ))
        .unwrap();
        assert_eq!(json["reason"], "parse_failure");
    }
}
