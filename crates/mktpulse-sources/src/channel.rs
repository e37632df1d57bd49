//! Video-channel statistics (subscriber count) via the Data API v3.

use reqwest::Client;
use serde::Deserialize;

use crate::auth::AccessToken;
use crate::error::{check_status, decode_json, SourceError};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    statistics: ChannelStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    #[serde(default)]
    subscriber_count: Option<String>,
}

pub struct ChannelStatsClient {
    client: Client,
    base_url: String,
}

impl ChannelStatsClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Points the client at a custom host (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Current subscriber count of `channel_id`.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotFound`] if the channel does not exist or hides its count.
    /// - [`SourceError::Parse`] if the count is not numeric.
    /// - [`SourceError::Auth`] / [`SourceError::UnexpectedStatus`] /
    ///   [`SourceError::Http`] / [`SourceError::Deserialize`] on API failure.
    pub async fn subscriber_count(
        &self,
        token: &AccessToken,
        channel_id: &str,
    ) -> Result<u64, SourceError> {
        let context = format!("channels.list({channel_id})");
        let response = self
            .client
            .get(format!("{}/youtube/v3/channels", self.base_url))
            .bearer_auth(token.bearer())
            .query(&[("part", "statistics"), ("id", channel_id)])
            .send()
            .await?;
        let response = check_status(response, &context)?;
        let body: ChannelListResponse = decode_json(response, &context).await?;

        let raw = body
            .items
            .into_iter()
            .next()
            .and_then(|item| item.statistics.subscriber_count)
            .ok_or_else(|| SourceError::NotFound(format!("subscriber count for {channel_id}")))?;
        raw.trim()
            .parse::<u64>()
            .map_err(|e| SourceError::Parse(format!("{context}: '{raw}': {e}")))
    }
}
