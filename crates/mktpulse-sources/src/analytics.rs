//! Client for the analytics Data API `runReport` endpoint.
//!
//! Only the request shapes the pipelines need are modelled: a single date
//! range, one metric, an optional dimension, an optional exact-match event
//! filter, and a descending metric order with a row limit.

use mktpulse_core::{RankedEntry, ReportWindow};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::auth::AccessToken;
use crate::error::{check_status, decode_json, SourceError};

const DEFAULT_BASE_URL: &str = "https://analyticsdata.googleapis.com";

/// Dimension that carries the event name in the analytics data model.
const EVENT_NAME_FIELD: &str = "eventName";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportRequest<'a> {
    date_ranges: [DateRange; 1],
    metrics: [Named<'a>; 1],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimensions: Vec<Named<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension_filter: Option<FilterExpression<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<OrderBy<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct Named<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct FilterExpression<'a> {
    filter: Filter<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Filter<'a> {
    field_name: &'a str,
    string_filter: StringFilter<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StringFilter<'a> {
    match_type: &'static str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderBy<'a> {
    metric: MetricOrderBy<'a>,
    desc: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricOrderBy<'a> {
    metric_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<CellValue>,
    #[serde(default)]
    metric_values: Vec<CellValue>,
}

#[derive(Debug, Deserialize)]
struct CellValue {
    #[serde(default)]
    value: String,
}

/// A ranked breakdown query: one dimension, ordered by `metric` descending.
#[derive(Debug, Clone, Copy)]
pub struct RankedQuery<'a> {
    pub dimension: &'a str,
    pub metric: &'a str,
    pub event: Option<&'a str>,
    pub limit: usize,
}

/// Analytics Data API client bound to one property.
pub struct AnalyticsClient {
    client: Client,
    base_url: String,
    property_id: String,
}

impl AnalyticsClient {
    #[must_use]
    pub fn new(client: Client, property_id: &str) -> Self {
        Self::with_base_url(client, property_id, DEFAULT_BASE_URL)
    }

    /// Points the client at a custom host (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Client, property_id: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            property_id: property_id.to_string(),
        }
    }

    fn run_report_url(&self) -> String {
        format!(
            "{}/v1beta/properties/{}:runReport",
            self.base_url, self.property_id
        )
    }

    /// Aggregate total of `metric` over `window`, optionally restricted to one event.
    ///
    /// The service omits rows when the total is zero, so an empty response is 0.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Auth`] if the token is rejected.
    /// - [`SourceError::UnexpectedStatus`] / [`SourceError::Http`] on transport failure.
    /// - [`SourceError::Deserialize`] / [`SourceError::Parse`] on malformed payloads.
    pub async fn scalar_total(
        &self,
        token: &AccessToken,
        window: &ReportWindow,
        metric: &str,
        event: Option<&str>,
    ) -> Result<u64, SourceError> {
        let request = RunReportRequest {
            date_ranges: [date_range(window)],
            metrics: [Named { name: metric }],
            dimensions: Vec::new(),
            dimension_filter: event.map(event_filter),
            order_bys: Vec::new(),
            limit: None,
        };
        let response = self.run_report(token, &request, metric).await?;
        match response.rows.first() {
            None => Ok(0),
            Some(row) => parse_metric(row, metric),
        }
    }

    /// Top rows of a breakdown, ordered descending and truncated server-side.
    ///
    /// # Errors
    ///
    /// Same as [`AnalyticsClient::scalar_total`].
    pub async fn ranked(
        &self,
        token: &AccessToken,
        window: &ReportWindow,
        query: RankedQuery<'_>,
    ) -> Result<Vec<RankedEntry>, SourceError> {
        let request = RunReportRequest {
            date_ranges: [date_range(window)],
            metrics: [Named { name: query.metric }],
            dimensions: vec![Named {
                name: query.dimension,
            }],
            dimension_filter: query.event.map(event_filter),
            order_bys: vec![OrderBy {
                metric: MetricOrderBy {
                    metric_name: query.metric,
                },
                desc: true,
            }],
            limit: Some(query.limit),
        };
        let context = format!("{} by {}", query.metric, query.dimension);
        let response = self.run_report(token, &request, &context).await?;

        response
            .rows
            .iter()
            .map(|row| {
                let key = row
                    .dimension_values
                    .first()
                    .map(|v| v.value.trim().to_string())
                    .ok_or_else(|| {
                        SourceError::Parse(format!("{context}: row without dimension value"))
                    })?;
                Ok(RankedEntry::new(key, parse_metric(row, query.metric)?))
            })
            .collect()
    }

    async fn run_report(
        &self,
        token: &AccessToken,
        request: &RunReportRequest<'_>,
        context: &str,
    ) -> Result<RunReportResponse, SourceError> {
        let context = format!("runReport({context})");
        let response = self
            .client
            .post(self.run_report_url())
            .bearer_auth(token.bearer())
            .json(request)
            .send()
            .await?;
        let response = check_status(response, &context)?;
        decode_json(response, &context).await
    }
}

fn date_range(window: &ReportWindow) -> DateRange {
    DateRange {
        start_date: window.start_iso(),
        end_date: window.end_iso(),
    }
}

fn event_filter(event: &str) -> FilterExpression<'_> {
    FilterExpression {
        filter: Filter {
            field_name: EVENT_NAME_FIELD,
            string_filter: StringFilter {
                match_type: "EXACT",
                value: event,
            },
        },
    }
}

fn parse_metric(row: &ReportRow, metric: &str) -> Result<u64, SourceError> {
    let raw = row
        .metric_values
        .first()
        .map(|v| v.value.trim())
        .ok_or_else(|| SourceError::Parse(format!("{metric}: row without metric value")))?;
    raw.parse::<u64>()
        .map_err(|e| SourceError::Parse(format!("{metric}: '{raw}' is not a count: {e}")))
}
