use std::time::Duration;

use thiserror::Error;

/// Failures detected before any network call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("configuration value {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors surfaced by the remote collaborators (Spotify and the mail API).
///
/// Only `Transient` is retryable; everything else propagates unmodified to
/// the generator, which turns it into the final failure report.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transient api error: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("unexpected response from provider: {0}")]
    UnexpectedResponse(String),

    #[error("provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("recipient rejected by mail service: {0}")]
    InvalidRecipient(String),

    #[error("run exceeded its deadline of {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn transient(message: impl Into<String>) -> Self {
        ApiError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient { .. })
    }

    /// Stable identifier used in the structured failure report.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Auth(_) => "auth",
            ApiError::Transient { .. } => "transient",
            ApiError::UnexpectedResponse(_) => "unexpected-response",
            ApiError::QuotaExceeded(_) => "quota-exceeded",
            ApiError::InvalidRecipient(_) => "invalid-recipient",
            ApiError::Timeout(_) => "timeout",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::UnexpectedResponse(err.to_string())
        } else {
            // Connect failures and request timeouts are worth another attempt.
            ApiError::transient(err.to_string())
        }
    }
}
