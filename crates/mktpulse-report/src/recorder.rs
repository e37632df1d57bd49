//! Appends one raw-metric row per run to the tracking spreadsheet.
//!
//! Rows are keyed by the run's anchor date in `d/m/yyyy` form. Appends are
//! not idempotent: recording the same date twice writes two rows, and
//! concurrent runs against one sheet must be serialized by the caller.

use chrono::NaiveDate;
use mktpulse_core::{column_index, sheet_date_key, MetricSample, PipelineConfig, Unavailable};
use mktpulse_sources::{Credential, RecorderMetrics, SheetsClient, SourceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no spreadsheet credential: {0}")]
    Unauthorized(Unavailable),

    #[error("row append failed: {0}")]
    Append(#[from] SourceError),
}

pub struct SheetRecorder<'a> {
    sheets: &'a SheetsClient,
    pipeline: &'a PipelineConfig,
}

impl<'a> SheetRecorder<'a> {
    #[must_use]
    pub fn new(sheets: &'a SheetsClient, pipeline: &'a PipelineConfig) -> Self {
        Self { sheets, pipeline }
    }

    /// Lays out one row: anchor key, users, then each platform in its
    /// configured column. Unavailable values and unused columns are empty.
    #[must_use]
    pub fn build_row(&self, anchor: NaiveDate, metrics: &RecorderMetrics) -> Vec<String> {
        let mut cells: Vec<(usize, String)> = vec![
            (self.pipeline.key_column_index(), sheet_date_key(anchor)),
            (
                column_index(&self.pipeline.recorder.users_column).unwrap_or(1),
                cell_text(&metrics.users),
            ),
        ];
        cells.extend(metrics.social.iter().filter_map(|social| {
            column_index(&social.column).map(|idx| (idx, cell_text(&social.sample)))
        }));

        let width = cells.iter().map(|(idx, _)| idx + 1).max().unwrap_or(0);
        let mut row = vec![String::new(); width];
        for (idx, text) in cells {
            row[idx] = text;
        }
        row
    }

    /// Appends the row for `anchor`. Returns the range the store reports.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Unauthorized`] when the run has no token and
    /// [`RecordError::Append`] when the store rejects the write.
    pub async fn append_row(
        &self,
        anchor: NaiveDate,
        metrics: &RecorderMetrics,
        credential: &Credential,
    ) -> Result<Option<String>, RecordError> {
        let token = credential
            .as_ref()
            .map_err(|u| RecordError::Unauthorized(u.clone()))?;
        let row = self.build_row(anchor, metrics);
        let written = self.sheets.append_row(token, &row).await?;
        tracing::info!(
            anchor = %anchor,
            range = written.as_deref().unwrap_or("unknown"),
            "metrics row appended"
        );
        Ok(written)
    }
}

fn cell_text(sample: &MetricSample<u64>) -> String {
    sample.value().map(u64::to_string).unwrap_or_default()
}
