//! Error types for huddle-ai

use thiserror::Error;

/// Result type alias using huddle-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a language-model provider
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type}, status: {status})")]
    Api {
        status: u16,
        error_type: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an API error from status, type and message
    pub fn api(status: u16, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a transient overload/timeout condition worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } | Error::Timeout => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Api {
                status,
                error_type,
                message,
            } => {
                if *status == 429 || *status == 529 || (500..600).contains(status) {
                    return true;
                }
                let et = error_type.to_lowercase();
                let msg = message.to_lowercase();
                et.contains("rate_limit")
                    || et.contains("overloaded")
                    || msg.contains("rate limit")
                    || msg.contains("overloaded")
                    || msg.contains("too many requests")
            }
            _ => false,
        }
    }
}
