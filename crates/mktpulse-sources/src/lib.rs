//! Metric sources for the marketing pulse pipelines.
//!
//! HTTP clients for the analytics, spreadsheet and channel-statistics APIs,
//! a headless-browser scraper for follower counts, and [`SourceFetcher`],
//! which fans out over all of them and isolates each source's failure into an
//! `Unavailable` sample.

pub mod analytics;
pub mod auth;
pub mod browser;
pub mod channel;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod scrape;
pub mod sheets;

pub use auth::{AccessToken, GoogleAuth};
pub use browser::{BrowserConfig, BrowserSession};
pub use error::SourceError;
pub use fetch::{
    Credential, Endpoints, RecordedSocial, RecorderMetrics, ReportSamples, SourceFetcher,
};
pub use normalize::{normalize_count, ChannelLabeler};
pub use sheets::SheetsClient;
