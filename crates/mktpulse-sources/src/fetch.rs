//! Fan-out over every configured source.
//!
//! Every source runs under its own timeout and resolves to a
//! [`MetricSample`]; a failing source becomes `Unavailable` with a reason and
//! never aborts the others. The access token is exchanged once per run and
//! shared by all Google-backed sources; if the exchange fails they all degrade
//! to `AuthError` while scrapers still run.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use mktpulse_core::{
    column_index, sheet_date_key, AppConfig, Cadence, MetricSample, PeriodWindows,
    PipelineConfig, RankedEntry, ReportWindow, SocialSnapshot, SocialSource, SourceId,
    Unavailable, UnavailableReason, WindowRole,
};
use reqwest::Client;

use crate::analytics::{AnalyticsClient, RankedQuery};
use crate::auth::{AccessToken, GoogleAuth};
use crate::browser::BrowserConfig;
use crate::channel::ChannelStatsClient;
use crate::error::SourceError;
use crate::normalize::{normalize_count, ChannelLabeler};
use crate::scrape::scrape_followers;
use crate::sheets::SheetsClient;

/// Outcome of the per-run token exchange, shared by every Google-backed source.
pub type Credential = Result<AccessToken, Unavailable>;

/// Base URLs of the external services. Overridden in tests.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token_uri: String,
    pub analytics: String,
    pub sheets: String,
    pub channels: String,
}

impl Endpoints {
    /// Production endpoints, with the token URI taken from configuration.
    #[must_use]
    pub fn google(token_uri: &str) -> Self {
        Self {
            token_uri: token_uri.to_string(),
            analytics: "https://analyticsdata.googleapis.com".to_string(),
            sheets: "https://sheets.googleapis.com".to_string(),
            channels: "https://www.googleapis.com".to_string(),
        }
    }
}

/// Everything the narrative pipeline fetched for one run.
#[derive(Debug, Clone)]
pub struct ReportSamples {
    pub windows: PeriodWindows,
    pub users_current: MetricSample<u64>,
    pub users_comparison: MetricSample<u64>,
    /// Un-truncated total of intent events over the report window.
    pub intent_total: MetricSample<u64>,
    pub intent_by_country: MetricSample<Vec<RankedEntry>>,
    /// Channel mix with display labels already applied.
    pub channels: MetricSample<Vec<RankedEntry>>,
    pub app_clicks: MetricSample<u64>,
    pub social: Vec<SocialSnapshot>,
}

impl ReportSamples {
    /// Source ids and reasons of every sample that came back unavailable.
    #[must_use]
    pub fn unavailable(&self) -> Vec<(String, UnavailableReason)> {
        let mut out: Vec<(String, UnavailableReason)> = [
            reason_of(&self.users_current),
            reason_of(&self.users_comparison),
            reason_of(&self.intent_total),
            reason_of(&self.intent_by_country),
            reason_of(&self.channels),
            reason_of(&self.app_clicks),
        ]
        .into_iter()
        .flatten()
        .collect();
        out.extend(self.social.iter().filter_map(|s| {
            s.count
                .as_ref()
                .err()
                .map(|u| (SourceId::SheetSocial(s.platform.clone()).to_string(), u.reason))
        }));
        out
    }
}

fn reason_of<T>(sample: &MetricSample<T>) -> Option<(String, UnavailableReason)> {
    sample
        .unavailable_reason()
        .map(|reason| (sample.source.to_string(), reason))
}

/// One social count destined for a recorder column.
#[derive(Debug, Clone)]
pub struct RecordedSocial {
    pub platform: String,
    pub column: String,
    pub sample: MetricSample<u64>,
}

/// Raw metrics the recorder writes for one anchor date.
#[derive(Debug, Clone)]
pub struct RecorderMetrics {
    pub window: ReportWindow,
    pub users: MetricSample<u64>,
    pub social: Vec<RecordedSocial>,
}

pub struct SourceFetcher {
    auth: GoogleAuth,
    analytics: AnalyticsClient,
    sheets: SheetsClient,
    channels: ChannelStatsClient,
    browser: BrowserConfig,
    labeler: ChannelLabeler,
    pipeline: PipelineConfig,
    source_timeout: Duration,
}

impl SourceFetcher {
    /// Builds the fetcher against the production endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be constructed.
    pub fn new(app: &AppConfig, pipeline: &PipelineConfig) -> Result<Self, SourceError> {
        Self::with_endpoints(app, pipeline, &Endpoints::google(&app.gcp_token_uri))
    }

    /// Builds the fetcher against custom endpoints (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be constructed.
    pub fn with_endpoints(
        app: &AppConfig,
        pipeline: &PipelineConfig,
        endpoints: &Endpoints,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(app.http_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(app.user_agent.as_str())
            .build()?;

        Ok(Self {
            auth: GoogleAuth::new(
                client.clone(),
                &endpoints.token_uri,
                &app.gcp_client_id,
                &app.gcp_client_secret,
                &app.gcp_refresh_token,
            ),
            analytics: AnalyticsClient::with_base_url(
                client.clone(),
                &pipeline.analytics.property_id,
                &endpoints.analytics,
            ),
            sheets: SheetsClient::with_base_url(
                client.clone(),
                &pipeline.spreadsheet.spreadsheet_id,
                &pipeline.spreadsheet.sheet_name,
                &endpoints.sheets,
            ),
            channels: ChannelStatsClient::with_base_url(client, &endpoints.channels),
            browser: BrowserConfig {
                bin: app.browser_bin.clone(),
                user_agent: app.user_agent.clone(),
                render_budget_ms: app.browser_render_budget_ms,
            },
            labeler: ChannelLabeler::new(&pipeline.channel_labels),
            pipeline: pipeline.clone(),
            source_timeout: Duration::from_secs(app.source_timeout_secs),
        })
    }

    /// The spreadsheet client, shared with the recorder's append step.
    #[must_use]
    pub fn sheets(&self) -> &SheetsClient {
        &self.sheets
    }

    /// Exchanges the refresh token once for this run.
    pub async fn authorize(&self) -> Credential {
        let exchange = tokio::time::timeout(self.source_timeout, self.auth.access_token()).await;
        let failure = match exchange {
            Ok(Ok(token)) => return Ok(token),
            Ok(Err(e)) => Unavailable::new(e.reason(), e.to_string()),
            Err(_) => timed_out(self.source_timeout),
        };
        tracing::warn!(
            reason = %failure.reason,
            error = failure.detail.as_str(),
            "token refresh failed; Google-backed sources unavailable"
        );
        Err(failure)
    }

    /// Queries every report source concurrently.
    pub async fn fetch_report_samples(
        &self,
        windows: &PeriodWindows,
        credential: &Credential,
    ) -> ReportSamples {
        let analytics = &self.pipeline.analytics;
        let report = &windows.report;
        let comparison = &windows.comparison;
        let limit = self.pipeline.top_n;

        let (
            users_current,
            users_comparison,
            intent_total,
            intent_by_country,
            channels,
            app_clicks,
            social,
        ) = tokio::join!(
            self.google(credential, SourceId::ActiveUsers(WindowRole::Current), report, |t| {
                self.analytics.scalar_total(t, report, &analytics.users_metric, None)
            }),
            self.google(credential, SourceId::ActiveUsers(WindowRole::Comparison), comparison, |t| {
                self.analytics.scalar_total(t, comparison, &analytics.users_metric, None)
            }),
            self.google(credential, SourceId::IntentTotal, report, |t| {
                self.analytics.scalar_total(
                    t,
                    report,
                    "eventCount",
                    Some(analytics.intent_event.as_str()),
                )
            }),
            self.google(credential, SourceId::IntentByCountry, report, |t| {
                self.analytics.ranked(
                    t,
                    report,
                    RankedQuery {
                        dimension: &analytics.country_dimension,
                        metric: "eventCount",
                        event: Some(analytics.intent_event.as_str()),
                        limit,
                    },
                )
            }),
            self.google(credential, SourceId::Channels, report, |t| async move {
                let rows = self
                    .analytics
                    .ranked(
                        t,
                        report,
                        RankedQuery {
                            dimension: &analytics.channel_dimension,
                            metric: &analytics.users_metric,
                            event: None,
                            limit,
                        },
                    )
                    .await?;
                Ok::<_, SourceError>(self.labeler.relabel(rows))
            }),
            self.google(credential, SourceId::AppClicks, report, |t| {
                self.analytics.scalar_total(
                    t,
                    report,
                    "eventCount",
                    Some(analytics.app_click_event.as_str()),
                )
            }),
            self.sheet_social(credential, windows),
        );

        ReportSamples {
            windows: *windows,
            users_current,
            users_comparison,
            intent_total,
            intent_by_country,
            channels,
            app_clicks,
            social,
        }
    }

    /// Reads each platform's count from the spreadsheet. Weekly reports use
    /// the row keyed by the report window's start date; monthly reports use
    /// the latest row recorded inside the report month.
    async fn sheet_social(
        &self,
        credential: &Credential,
        windows: &PeriodWindows,
    ) -> Vec<SocialSnapshot> {
        let report = &windows.report;
        let cadence = windows.cadence;
        let key_column = self.pipeline.spreadsheet.key_column.as_str();
        let row = self
            .google(credential, SourceId::SheetSocial("row".to_string()), report, |t| async move {
                let (index, key) = match cadence {
                    Cadence::Weekly => {
                        let key = sheet_date_key(report.start());
                        let index = self.sheets.find_row(t, key_column, &key).await?;
                        (index, key)
                    }
                    Cadence::Monthly => {
                        self.sheets
                            .find_latest_row_within(t, key_column, report)
                            .await?
                    }
                };
                let cells = self.sheets.read_row(t, index).await?;
                Ok::<_, SourceError>((key, cells))
            })
            .await;

        self.pipeline
            .social
            .iter()
            .map(|platform| {
                let count = match &row.outcome {
                    Ok((key, cells)) => cell_count(cells, &platform.column, key),
                    Err(unavailable) => Err(unavailable.clone()),
                };
                if let Err(u) = &count {
                    if row.is_available() {
                        tracing::warn!(
                            source = %SourceId::SheetSocial(platform.platform.clone()),
                            reason = %u.reason,
                            window_start = %report.start(),
                            window_end = %report.end(),
                            error = u.detail.as_str(),
                            "source unavailable"
                        );
                    }
                }
                SocialSnapshot {
                    platform: platform.platform.clone(),
                    count,
                }
            })
            .collect()
    }

    /// Gathers the recorder's raw metrics for `window`.
    pub async fn fetch_recorder_metrics(
        &self,
        window: &ReportWindow,
        credential: &Credential,
    ) -> RecorderMetrics {
        let analytics = &self.pipeline.analytics;
        let users_source = SourceId::ActiveUsers(WindowRole::Current);
        let users = self.google(credential, users_source, window, |t| {
            self.analytics.scalar_total(t, window, &analytics.users_metric, None)
        });
        let social = join_all(self.pipeline.social.iter().map(|platform| async move {
            let sample = match &platform.source {
                SocialSource::Scrape { url, label } => {
                    self.bounded(
                        SourceId::ScrapedFollowers(platform.platform.clone()),
                        window,
                        scrape_followers(&self.browser, url, label),
                    )
                    .await
                }
                SocialSource::Channel { channel_id } => {
                    self.google(
                        credential,
                        SourceId::ChannelSubscribers(platform.platform.clone()),
                        window,
                        |t| self.channels.subscriber_count(t, channel_id),
                    )
                    .await
                }
            };
            RecordedSocial {
                platform: platform.platform.clone(),
                column: platform.column.clone(),
                sample,
            }
        }));
        let (users, social) = tokio::join!(users, social);

        RecorderMetrics {
            window: *window,
            users,
            social,
        }
    }

    /// Runs a Google-backed source, or degrades it when the run has no token.
    async fn google<'a, T, F, Fut>(
        &self,
        credential: &'a Credential,
        source: SourceId,
        window: &ReportWindow,
        call: F,
    ) -> MetricSample<T>
    where
        F: FnOnce(&'a AccessToken) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        match credential {
            Ok(token) => self.bounded(source, window, call(token)).await,
            Err(denied) => {
                log_unavailable(&source, window, denied);
                MetricSample {
                    source,
                    outcome: Err(denied.clone()),
                }
            }
        }
    }

    /// Applies the per-source timeout and converts failures into samples.
    async fn bounded<T>(
        &self,
        source: SourceId,
        window: &ReportWindow,
        fetch: impl Future<Output = Result<T, SourceError>>,
    ) -> MetricSample<T> {
        let failure = match tokio::time::timeout(self.source_timeout, fetch).await {
            Ok(Ok(value)) => return MetricSample::available(source, value),
            Ok(Err(e)) => Unavailable::new(e.reason(), e.to_string()),
            Err(_) => timed_out(self.source_timeout),
        };
        log_unavailable(&source, window, &failure);
        MetricSample {
            source,
            outcome: Err(failure),
        }
    }
}

fn timed_out(limit: Duration) -> Unavailable {
    Unavailable::new(
        UnavailableReason::TransportError,
        format!("timed out after {}s", limit.as_secs()),
    )
}

fn log_unavailable(source: &SourceId, window: &ReportWindow, failure: &Unavailable) {
    tracing::warn!(
        source = %source,
        reason = %failure.reason,
        window_start = %window.start(),
        window_end = %window.end(),
        error = failure.detail.as_str(),
        "source unavailable"
    );
}

/// Parses the social count stored in `column` of a sheet row.
fn cell_count(cells: &[String], column: &str, key: &str) -> Result<u64, Unavailable> {
    let index = column_index(column).ok_or_else(|| {
        Unavailable::new(
            UnavailableReason::NotFound,
            format!("invalid column '{column}'"),
        )
    })?;
    let raw = cells
        .get(index)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            Unavailable::new(
                UnavailableReason::NotFound,
                format!("empty cell {column} in row '{key}'"),
            )
        })?;
    normalize_count(raw).ok_or_else(|| {
        Unavailable::new(
            UnavailableReason::ParseFailure,
            format!("cell {column} in row '{key}' is not a count: '{raw}'"),
        )
    })
}

#[cfg(test)]
#[path = "fetch_test.rs"]
mod tests;
