//! The two pipeline drivers: the narrative report and the sheet recorder.
//!
//! Each run gets a fresh run id carried on its tracing span. Per-source
//! failures never abort a run; generation and delivery failures do, and a
//! generation failure means nothing is sent.

use std::time::Duration;

use chrono::NaiveDate;
use mktpulse_core::{AppConfig, Cadence, ConfigError, PeriodWindows, PipelineConfig};
use mktpulse_sources::{SourceError, SourceFetcher};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::assemble::assemble;
use crate::dispatch::{DeliveryError, LarkDispatcher};
use crate::narrative::{GeminiClient, GenerationError, NarrativeGenerator, TextGenerator};
use crate::recorder::{RecordError, SheetRecorder};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to initialise sources: {0}")]
    Sources(#[from] SourceError),

    #[error("narrative generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub run_id: Uuid,
    pub windows: PeriodWindows,
    pub message: String,
    /// Number of report fields rendered as placeholders.
    pub placeholders: usize,
    pub delivered: bool,
}

#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub run_id: Uuid,
    pub anchor: NaiveDate,
    pub row: Vec<String>,
    pub written_range: Option<String>,
    pub appended: bool,
}

/// Runs the narrative pipeline for `cadence` anchored on `today`.
///
/// With `dry_run` the message is generated but not delivered, and the chat
/// webhook need not be configured.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] when a required secret is missing (before
/// any fetch), and the generation or delivery error that ended the run.
pub async fn run_report(
    app: &AppConfig,
    pipeline: &PipelineConfig,
    cadence: Cadence,
    today: NaiveDate,
    dry_run: bool,
) -> Result<ReportOutcome, PipelineError> {
    let (api_key, webhook) = if dry_run {
        let key = app
            .gemini_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;
        (key, None)
    } else {
        let secrets = app.require_report_secrets()?;
        (secrets.gemini_api_key, Some(secrets.lark_webhook_url))
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(app.http_timeout_secs))
        .build()?;
    let fetcher = SourceFetcher::new(app, pipeline)?;
    let narrator = NarrativeGenerator::new(
        GeminiClient::new(client.clone(), api_key, &app.gemini_model),
        &pipeline.brand,
        &pipeline.narrative,
        app.generation_temperature,
    );
    let dispatcher = webhook.map(|url| LarkDispatcher::new(client, url));

    execute_report(
        &fetcher,
        &narrator,
        dispatcher.as_ref(),
        PeriodWindows::for_cadence(cadence, today),
        pipeline.top_n,
    )
    .await
}

/// Fetch, assemble, generate, and (when a dispatcher is given) deliver.
///
/// # Errors
///
/// Returns [`PipelineError::Generation`] without sending anything, or
/// [`PipelineError::Delivery`] if the single send attempt fails.
pub async fn execute_report<G: TextGenerator>(
    fetcher: &SourceFetcher,
    narrator: &NarrativeGenerator<G>,
    dispatcher: Option<&LarkDispatcher>,
    windows: PeriodWindows,
    top_n: usize,
) -> Result<ReportOutcome, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("report", run_id = %run_id, cadence = %windows.cadence);

    async move {
        tracing::info!(
            window_start = %windows.report.start(),
            window_end = %windows.report.end(),
            comparison_start = %windows.comparison.start(),
            comparison_end = %windows.comparison.end(),
            "report run started"
        );

        let credential = fetcher.authorize().await;
        let samples = fetcher.fetch_report_samples(&windows, &credential).await;
        let unavailable = samples.unavailable();
        if !unavailable.is_empty() {
            tracing::warn!(
                count = unavailable.len(),
                sources = ?unavailable,
                "report will carry placeholders"
            );
        }

        let context = assemble(samples, top_n);
        let message = narrator
            .generate(&context, windows.cadence)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "generation failed; nothing sent"))?;

        let delivered = match dispatcher {
            Some(dispatcher) => {
                dispatcher
                    .send(&message)
                    .await
                    .inspect_err(|e| tracing::error!(error = %e, "delivery failed"))?;
                true
            }
            None => {
                tracing::info!("dry run: message not delivered");
                false
            }
        };

        Ok(ReportOutcome {
            run_id,
            windows,
            message,
            placeholders: context.placeholder_count(),
            delivered,
        })
    }
    .instrument(span)
    .await
}

/// Runs the recorder pipeline: metrics over the weekly window before `today`,
/// appended under `today`'s key.
///
/// # Errors
///
/// Returns [`PipelineError::Sources`] if the clients cannot be built and
/// [`PipelineError::Record`] if the append fails.
pub async fn run_record(
    app: &AppConfig,
    pipeline: &PipelineConfig,
    today: NaiveDate,
    dry_run: bool,
) -> Result<RecordOutcome, PipelineError> {
    let fetcher = SourceFetcher::new(app, pipeline)?;
    execute_record(&fetcher, pipeline, today, dry_run).await
}

/// Fetches the recorder metrics and appends (or, on `dry_run`, only builds)
/// the row.
///
/// # Errors
///
/// Returns [`PipelineError::Record`] if the append fails.
pub async fn execute_record(
    fetcher: &SourceFetcher,
    pipeline: &PipelineConfig,
    today: NaiveDate,
    dry_run: bool,
) -> Result<RecordOutcome, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("record", run_id = %run_id, anchor = %today);

    async move {
        let window = PeriodWindows::weekly(today).report;
        let credential = fetcher.authorize().await;
        let metrics = fetcher.fetch_recorder_metrics(&window, &credential).await;
        let recorder = SheetRecorder::new(fetcher.sheets(), pipeline);
        let row = recorder.build_row(today, &metrics);

        if dry_run {
            tracing::info!("dry run: row not appended");
            return Ok(RecordOutcome {
                run_id,
                anchor: today,
                row,
                written_range: None,
                appended: false,
            });
        }

        let written_range = recorder.append_row(today, &metrics, &credential).await?;
        Ok(RecordOutcome {
            run_id,
            anchor: today,
            row,
            written_range,
            appended: true,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
