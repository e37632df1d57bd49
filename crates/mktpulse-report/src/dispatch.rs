//! Chat delivery: one text message posted to a webhook, one attempt.

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("chat webhook unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat webhook returned HTTP {status}")]
    Status { status: u16 },
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    msg_type: &'static str,
    content: TextContent<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    text: &'a str,
}

pub struct LarkDispatcher {
    client: Client,
    webhook_url: String,
}

impl LarkDispatcher {
    #[must_use]
    pub fn new(client: Client, webhook_url: &str) -> Self {
        Self {
            client,
            webhook_url: webhook_url.to_string(),
        }
    }

    /// Posts `text` once. No retry; the response body is not inspected.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Http`] if the endpoint cannot be reached and
    /// [`DeliveryError::Status`] on a non-2xx response.
    pub async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let message = TextMessage {
            msg_type: "text",
            content: TextContent { text },
        };
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }
        tracing::info!(chars = text.chars().count(), "pulse delivered");
        Ok(())
    }
}
