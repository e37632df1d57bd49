//! OAuth2 refresh-token exchange for the Google-backed sources.

use reqwest::Client;
use serde::Deserialize;

use crate::error::{check_status, decode_json, SourceError};

/// Short-lived bearer credential. Acquired once per run.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn bearer(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges a long-lived refresh token for an access token.
pub struct GoogleAuth {
    client: Client,
    token_uri: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl GoogleAuth {
    #[must_use]
    pub fn new(
        client: Client,
        token_uri: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Self {
        Self {
            client,
            token_uri: token_uri.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            refresh_token: refresh_token.to_string(),
        }
    }

    /// Performs the `grant_type=refresh_token` exchange.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Auth`] when the token endpoint rejects the grant
    ///   (HTTP 400, 401 or 403: revoked or malformed refresh token).
    /// - [`SourceError::UnexpectedStatus`] for any other non-2xx status.
    /// - [`SourceError::Http`] on network failure.
    /// - [`SourceError::Deserialize`] if the body carries no access token.
    pub async fn access_token(&self) -> Result<AccessToken, SourceError> {
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Err(SourceError::Auth {
                status: 400,
                context: "token refresh".to_string(),
            });
        }
        let response = check_status(response, "token refresh")?;
        let token: TokenResponse = decode_json(response, "token refresh").await?;
        tracing::debug!("refreshed access token");
        Ok(AccessToken(token.access_token))
    }
}
