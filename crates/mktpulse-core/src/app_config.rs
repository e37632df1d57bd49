use std::path::PathBuf;

use crate::ConfigError;

/// Environment-derived settings. Built once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub gcp_client_id: String,
    pub gcp_client_secret: String,
    pub gcp_refresh_token: String,
    pub gcp_token_uri: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub generation_temperature: f32,
    pub lark_webhook_url: Option<String>,
    pub pipeline_path: PathBuf,
    pub log_level: String,
    pub source_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub browser_bin: String,
    pub browser_render_budget_ms: u64,
}

/// Secrets only the narrative pipeline needs.
#[derive(Clone, Copy)]
pub struct ReportSecrets<'a> {
    pub gemini_api_key: &'a str,
    pub lark_webhook_url: &'a str,
}

impl AppConfig {
    /// Returns the generator key and chat webhook, or the first one missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] naming the absent variable.
    pub fn require_report_secrets(&self) -> Result<ReportSecrets<'_>, ConfigError> {
        let gemini_api_key = self
            .gemini_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;
        let lark_webhook_url = self
            .lark_webhook_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("LARK_WEBHOOK_URL".to_string()))?;
        Ok(ReportSecrets {
            gemini_api_key,
            lark_webhook_url,
        })
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("gcp_client_id", &self.gcp_client_id)
            .field("gcp_client_secret", &"[redacted]")
            .field("gcp_refresh_token", &"[redacted]")
            .field("gcp_token_uri", &self.gcp_token_uri)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("generation_temperature", &self.generation_temperature)
            .field(
                "lark_webhook_url",
                &self.lark_webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .field("pipeline_path", &self.pipeline_path)
            .field("log_level", &self.log_level)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("browser_bin", &self.browser_bin)
            .field("browser_render_budget_ms", &self.browser_render_budget_ms)
            .finish()
    }
}
