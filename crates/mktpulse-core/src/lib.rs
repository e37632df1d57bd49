//! Shared types and configuration for the marketing pulse pipelines.
//!
//! Holds the calendar arithmetic that picks report windows, the metric sample
//! model every source produces, and the two configuration layers (environment
//! and pipeline YAML) that are built once per run and passed down explicitly.

pub mod app_config;
pub mod config;
pub mod metrics;
pub mod period;
pub mod pipeline;

use thiserror::Error;

pub use app_config::{AppConfig, ReportSecrets};
pub use config::{load_app_config, load_app_config_from_env};
pub use metrics::{
    MetricSample, RankedEntry, SocialSnapshot, SourceId, Unavailable, UnavailableReason,
    WindowRole,
};
pub use period::{
    parse_sheet_date_key, sheet_date_key, Cadence, ParseCadenceError, PeriodWindows, ReportWindow,
};
pub use pipeline::{
    column_index, load_pipeline_config, parse_pipeline_config, AnalyticsConfig, NarrativeConfig,
    PipelineConfig, RecorderConfig, SocialPlatformConfig, SocialSource, SpreadsheetConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read pipeline file {path}: {source}")]
    PipelineFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline file: {0}")]
    PipelineFileParse(#[from] serde_yaml::Error),

    #[error("invalid pipeline config: {0}")]
    Validation(String),
}
