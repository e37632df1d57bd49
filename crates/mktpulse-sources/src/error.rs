use mktpulse_core::UnavailableReason;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("credential rejected ({status}) during {context}")]
    Auth { status: u16, context: String },

    #[error("unexpected HTTP status {status} from {context}")]
    UnexpectedStatus { status: u16, context: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("browser session error: {0}")]
    Browser(String),
}

impl SourceError {
    /// Classifies the error into the placeholder reason reported downstream.
    #[must_use]
    pub fn reason(&self) -> UnavailableReason {
        match self {
            SourceError::Http(e) => {
                if e.status().is_some_and(is_auth_status) {
                    UnavailableReason::AuthError
                } else if e.is_decode() {
                    UnavailableReason::ParseFailure
                } else {
                    UnavailableReason::TransportError
                }
            }
            SourceError::Auth { .. } => UnavailableReason::AuthError,
            SourceError::UnexpectedStatus { .. } | SourceError::Browser(_) => {
                UnavailableReason::TransportError
            }
            SourceError::Deserialize { .. } | SourceError::Parse(_) => {
                UnavailableReason::ParseFailure
            }
            SourceError::NotFound(_) => UnavailableReason::NotFound,
        }
    }
}

pub(crate) fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Maps a non-2xx response to [`SourceError::Auth`] or
/// [`SourceError::UnexpectedStatus`]; passes 2xx responses through.
pub(crate) fn check_status(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if is_auth_status(status) {
        return Err(SourceError::Auth {
            status: status.as_u16(),
            context: context.to_string(),
        });
    }
    Err(SourceError::UnexpectedStatus {
        status: status.as_u16(),
        context: context.to_string(),
    })
}

/// Reads the body as text and deserializes it, tagging failures with `context`.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, SourceError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}
