use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::AppConfig;
use crate::ConfigError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can pass a plain map.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let optional =
        |var: &str| -> Option<String> { lookup(var).ok().filter(|v| !v.trim().is_empty()) };

    let or_default = |var: &str, default: &str| -> String {
        optional(var).unwrap_or_else(|| default.to_string())
    };

    let gcp_client_id = require("GCP_CLIENT_ID")?;
    let gcp_client_secret = require("GCP_CLIENT_SECRET")?;
    let gcp_refresh_token = require("GCP_REFRESH_TOKEN")?;
    let gcp_token_uri = or_default("GCP_TOKEN_URI", DEFAULT_TOKEN_URI);

    let gemini_api_key = optional("GEMINI_API_KEY");
    let gemini_model = or_default("GEMINI_MODEL", "gemini-2.5-flash");
    let generation_temperature: f32 = parse_value(
        "MKTPULSE_GENERATION_TEMPERATURE",
        &or_default("MKTPULSE_GENERATION_TEMPERATURE", "0.4"),
    )?;
    if !(0.0..=2.0).contains(&generation_temperature) {
        return Err(ConfigError::InvalidEnvVar {
            var: "MKTPULSE_GENERATION_TEMPERATURE".to_string(),
            reason: format!("{generation_temperature} is outside 0.0..=2.0"),
        });
    }
    let lark_webhook_url = optional("LARK_WEBHOOK_URL");

    let pipeline_path = PathBuf::from(or_default(
        "MKTPULSE_PIPELINE_PATH",
        "./config/pipeline.yaml",
    ));
    let log_level = or_default("MKTPULSE_LOG_LEVEL", "info");

    let source_timeout_secs: u64 = parse_value(
        "MKTPULSE_SOURCE_TIMEOUT_SECS",
        &or_default("MKTPULSE_SOURCE_TIMEOUT_SECS", "45"),
    )?;
    let http_timeout_secs: u64 = parse_value(
        "MKTPULSE_HTTP_TIMEOUT_SECS",
        &or_default("MKTPULSE_HTTP_TIMEOUT_SECS", "30"),
    )?;
    if source_timeout_secs == 0 || http_timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: if source_timeout_secs == 0 {
                "MKTPULSE_SOURCE_TIMEOUT_SECS"
            } else {
                "MKTPULSE_HTTP_TIMEOUT_SECS"
            }
            .to_string(),
            reason: "timeout must be at least one second".to_string(),
        });
    }

    let user_agent = or_default("MKTPULSE_USER_AGENT", DEFAULT_USER_AGENT);
    let browser_bin = or_default("MKTPULSE_BROWSER_BIN", "chromium");
    let browser_render_budget_ms: u64 = parse_value(
        "MKTPULSE_BROWSER_RENDER_BUDGET_MS",
        &or_default("MKTPULSE_BROWSER_RENDER_BUDGET_MS", "5000"),
    )?;

    Ok(AppConfig {
        gcp_client_id,
        gcp_client_secret,
        gcp_refresh_token,
        gcp_token_uri,
        gemini_api_key,
        gemini_model,
        generation_temperature,
        lark_webhook_url,
        pipeline_path,
        log_level,
        source_timeout_secs,
        http_timeout_secs,
        user_agent,
        browser_bin,
        browser_render_budget_ms,
    })
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
