//! Pipeline settings loaded from YAML: which sources to query and where
//! values live in the tracking spreadsheet.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_top_n() -> usize {
    7
}

fn default_users_metric() -> String {
    "activeUsers".to_string()
}

fn default_country_dimension() -> String {
    "country".to_string()
}

fn default_channel_dimension() -> String {
    "sessionSourceMedium".to_string()
}

fn default_key_column() -> String {
    "A".to_string()
}

fn default_author_role() -> String {
    "Head of Marketing".to_string()
}

fn default_greeting() -> String {
    "Hi Team,".to_string()
}

fn default_sign_off() -> String {
    "Best,".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Organisation name the narrative is written for.
    pub brand: String,
    /// Cap for every ranked list.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    pub analytics: AnalyticsConfig,
    pub spreadsheet: SpreadsheetConfig,
    #[serde(default)]
    pub social: Vec<SocialPlatformConfig>,
    pub recorder: RecorderConfig,
    /// Short-link domain -> display label for channel names.
    #[serde(default)]
    pub channel_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

/// Voice and framing lines handed to the text generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default = "default_author_role")]
    pub author_role: String,
    /// First line of the message body; the sanitizer keys on it.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_sign_off")]
    pub sign_off: String,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            author_role: default_author_role(),
            greeting: default_greeting(),
            sign_off: default_sign_off(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub property_id: String,
    #[serde(default = "default_users_metric")]
    pub users_metric: String,
    /// Event counted as a sign-up intent signal.
    pub intent_event: String,
    /// Event counted as an app-interest click.
    pub app_click_event: String,
    #[serde(default = "default_country_dimension")]
    pub country_dimension: String,
    #[serde(default = "default_channel_dimension")]
    pub channel_dimension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadsheetConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Column holding the `d/m/yyyy` anchor-date key.
    #[serde(default = "default_key_column")]
    pub key_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPlatformConfig {
    pub platform: String,
    /// Spreadsheet column the platform's count is stored in.
    pub column: String,
    pub source: SocialSource,
}

/// How the recorder obtains a platform's count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SocialSource {
    /// Render `url` in a headless browser and match `<number><K|M>? <label>`.
    Scrape { url: String, label: String },
    /// Read the subscriber count from the channel statistics API.
    Channel { channel_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Column receiving active users over the run's weekly window.
    pub users_column: String,
}

impl PipelineConfig {
    /// Zero-based index of the anchor-date key column.
    #[must_use]
    pub fn key_column_index(&self) -> usize {
        column_index(&self.spreadsheet.key_column).unwrap_or(0)
    }
}

/// Converts a spreadsheet column letter (`A`, `H`, `AA`) to a zero-based index.
#[must_use]
pub fn column_index(letters: &str) -> Option<usize> {
    let letters = letters.trim();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.chars().try_fold(0_usize, |acc, c| {
        let c = c.to_ascii_uppercase();
        c.is_ascii_uppercase()
            .then(|| acc * 26 + (c as usize - 'A' as usize + 1))
    })
    .map(|n| n - 1)
}

/// Load and validate the pipeline YAML file.
///
/// # Errors
///
/// Returns [`ConfigError::PipelineFileIo`] if the file cannot be read,
/// [`ConfigError::PipelineFileParse`] if the YAML is invalid, or
/// [`ConfigError::Validation`] if the settings are inconsistent.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PipelineFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_pipeline_config(&content)
}

/// Parse and validate pipeline YAML already in memory.
///
/// # Errors
///
/// Same as [`load_pipeline_config`] minus the I/O case.
pub fn parse_pipeline_config(yaml: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = serde_yaml::from_str(yaml)?;
    validate_pipeline(&config)?;
    Ok(config)
}

fn validate_pipeline(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.narrative.greeting.trim().is_empty() {
        return Err(ConfigError::Validation(
            "narrative.greeting must be non-empty".to_string(),
        ));
    }
    if config.top_n == 0 {
        return Err(ConfigError::Validation("top_n must be at least 1".to_string()));
    }
    if config.analytics.property_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "analytics.property_id must be non-empty".to_string(),
        ));
    }
    if config.spreadsheet.spreadsheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "spreadsheet.spreadsheet_id must be non-empty".to_string(),
        ));
    }

    let mut used_columns: HashSet<usize> = HashSet::new();
    let mut claim = |field: &str, letters: &str| -> Result<(), ConfigError> {
        let idx = column_index(letters).ok_or_else(|| {
            ConfigError::Validation(format!("{field} has invalid column '{letters}'"))
        })?;
        if !used_columns.insert(idx) {
            return Err(ConfigError::Validation(format!(
                "{field} reuses column '{letters}'"
            )));
        }
        Ok(())
    };

    claim("spreadsheet.key_column", &config.spreadsheet.key_column)?;
    claim("recorder.users_column", &config.recorder.users_column)?;

    let mut seen_platforms = HashSet::new();
    for social in &config.social {
        if social.platform.trim().is_empty() {
            return Err(ConfigError::Validation(
                "social platform name must be non-empty".to_string(),
            ));
        }
        if !seen_platforms.insert(social.platform.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate social platform '{}'",
                social.platform
            )));
        }
        claim(&format!("social.{}", social.platform), &social.column)?;
        if let SocialSource::Scrape { url, label } = &social.source {
            if url.trim().is_empty() || label.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "social.{} scrape source needs a url and a label",
                    social.platform
                )));
            }
        }
    }

    Ok(())
}
