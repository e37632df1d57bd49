//! Narrative drafting behind a text-generation seam, plus the deterministic
//! post-processing every draft goes through before delivery.

use async_trait::async_trait;
use mktpulse_core::{Cadence, NarrativeConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assemble::ReportContext;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Emphasis marker the chat channel renders literally.
const PROHIBITED_EMPHASIS: &str = "**";

pub const WEEKLY_BANNER: &str = "🚀 Marketing Weekly Pulse";
pub const MONTHLY_BANNER: &str = "📊 Marketing Monthly Pulse";

/// Section markers the draft must contain, in order.
pub const REQUIRED_SECTIONS: [&str; 4] = [
    "「Web Traffic」",
    "「Growth & Intent」",
    "「Social Media」",
    "「Next Step」",
];

/// Prefixes that mark a leading subject/title line.
const LABEL_PREFIXES: [&str; 5] = ["subject", "title", "headline", "heading", "topic"];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text generation returned HTTP {status}")]
    Status { status: u16 },

    #[error("text generation response could not be decoded: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("text generation returned no text")]
    Empty,
}

/// Free-text generation capability. Output is untrusted.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    #[must_use]
    pub fn new(client: Client, api_key: &str, model: &str) -> Self {
        Self::with_base_url(client, api_key, model, DEFAULT_BASE_URL)
    }

    /// Points the client at a custom host (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Client, api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature },
        };
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
            });
        }
        let body: GenerateResponse = serde_json::from_str(&response.text().await?)?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        Ok(text)
    }
}

/// Drafts and post-processes the pulse message.
pub struct NarrativeGenerator<G> {
    generator: G,
    brand: String,
    voice: NarrativeConfig,
    temperature: f32,
}

impl<G: TextGenerator> NarrativeGenerator<G> {
    #[must_use]
    pub fn new(generator: G, brand: &str, voice: &NarrativeConfig, temperature: f32) -> Self {
        Self {
            generator,
            brand: brand.to_string(),
            voice: voice.clone(),
            temperature,
        }
    }

    /// Produces the final, sanitized message for `context`.
    ///
    /// # Errors
    ///
    /// Returns the generator's error, or [`GenerationError::Empty`] when the
    /// draft is empty before or after sanitization.
    pub async fn generate(
        &self,
        context: &ReportContext,
        cadence: Cadence,
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(context, cadence, &self.brand, &self.voice);
        let draft = self.generator.generate(&prompt, self.temperature).await?;
        if draft.trim().is_empty() {
            return Err(GenerationError::Empty);
        }

        let body = sanitize(&draft, &self.voice.greeting);
        if body.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        let missing = missing_sections(&body);
        if !missing.is_empty() {
            tracing::warn!(
                cadence = %cadence,
                missing = ?missing,
                "draft is missing required section markers"
            );
        }
        Ok(finalize(&body, cadence))
    }
}

fn comparison_phrase(cadence: Cadence) -> (&'static str, &'static str) {
    match cadence {
        Cadence::Weekly => ("last week", "week-over-week"),
        Cadence::Monthly => ("last month", "month-over-month"),
    }
}

/// Builds the generator prompt: literal values, window bounds, and the
/// structural rules the draft must follow.
#[must_use]
pub fn build_prompt(
    context: &ReportContext,
    cadence: Cadence,
    brand: &str,
    voice: &NarrativeConfig,
) -> String {
    let (period_label, trend_label) = comparison_phrase(cadence);
    let report = context.windows.report;
    let comparison = context.windows.comparison;
    let social = if context.social.is_empty() {
        "none tracked".to_string()
    } else {
        context
            .social
            .iter()
            .map(|s| format!("{}: {}", s.platform, s.count))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let sections = REQUIRED_SECTIONS.join(", ");

    format!(
        "Role: {role} at {brand}.\n\
         Task: write the {cadence} marketing pulse message for the team chat.\n\
         \n\
         Period: {report} ({period_label}), compared with {comparison}.\n\
         \n\
         Data (N/A means the source was unavailable; say so rather than guessing):\n\
         - Active users: {users} ({trend_label}: {change})\n\
         - Sign-up intent signals: {intent}\n\
         - Top intent countries: {countries}\n\
         - Top acquisition channels: {channels}\n\
         - App download clicks: {clicks}\n\
         - Social followers: {social}\n\
         \n\
         Rules:\n\
         1. Do not write a title, subject or headline line.\n\
         2. Start with the greeting \"{greeting}\" on its own line, then one sentence naming the period {report}.\n\
         3. Use exactly these section titles, each on its own line, in this order: {sections}.\n\
         4. Put every number in parentheses, for example (1,520).\n\
         5. Never use \"{emphasis}\" or any other markdown emphasis.\n\
         6. Under 「Next Step」 write one short, actionable sentence based on the data.\n\
         7. End with \"{sign_off}\".\n",
        role = voice.author_role,
        users = context.users,
        change = context.users_change,
        intent = context.intent_total,
        countries = context.top_countries,
        channels = context.top_channels,
        clicks = context.app_clicks,
        greeting = voice.greeting,
        emphasis = PROHIBITED_EMPHASIS,
        sign_off = voice.sign_off,
    )
}

/// Deterministic cleanup of a raw draft.
///
/// Removes every `**`, then drops a leading subject/title line (and everything
/// before it) that precedes the greeting. Without a greeting only the first
/// non-empty line is considered.
#[must_use]
pub fn sanitize(raw: &str, greeting: &str) -> String {
    let text = raw.replace(PROHIBITED_EMPHASIS, "");
    let lines: Vec<&str> = text.lines().collect();
    let greeting = greeting.trim();

    let greeting_at = lines
        .iter()
        .position(|line| !greeting.is_empty() && line.trim_start().starts_with(greeting));
    let label_at = match greeting_at {
        Some(g) => lines[..g].iter().rposition(|line| is_label_line(line)),
        None => lines
            .iter()
            .position(|line| !line.trim().is_empty())
            .filter(|&first| is_label_line(lines[first])),
    };

    let kept = match label_at {
        Some(idx) => &lines[idx + 1..],
        None => &lines[..],
    };
    kept.iter()
        .skip_while(|line| line.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

fn is_label_line(line: &str) -> bool {
    let trimmed = line.trim().trim_start_matches('#').trim_start();
    if trimmed == WEEKLY_BANNER || trimmed == MONTHLY_BANNER {
        return true;
    }
    let Some((prefix, _)) = trimmed.split_once([':', '：']) else {
        return false;
    };
    let prefix = prefix.trim().to_ascii_lowercase();
    LABEL_PREFIXES.contains(&prefix.as_str())
}

/// Required section markers absent from `text`.
#[must_use]
pub fn missing_sections(text: &str) -> Vec<&'static str> {
    REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|marker| !text.contains(marker))
        .collect()
}

/// Prepends the cadence banner.
#[must_use]
pub fn finalize(body: &str, cadence: Cadence) -> String {
    let banner = match cadence {
        Cadence::Weekly => WEEKLY_BANNER,
        Cadence::Monthly => MONTHLY_BANNER,
    };
    format!("{banner}\n\n{body}")
}

#[cfg(test)]
#[path = "narrative_test.rs"]
mod tests;
