//! Error types for huddle-agent

use thiserror::Error;

/// Result type alias using huddle-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the orchestration engine.
///
/// None of these escape [`Orchestrator::process`](crate::Orchestrator::process);
/// they are caught at the loop boundary and turned into a reply.
#[derive(Error, Debug)]
pub enum Error {
    /// Model overload, rate limit or timeout. Retried with backoff.
    #[error("model provider unavailable: {0}")]
    ProviderTransient(#[source] huddle_ai::Error),

    /// Auth failure, malformed request or unparseable response. Never retried.
    #[error("model provider error: {0}")]
    ProviderPermanent(#[source] huddle_ai::Error),

    /// Registry miss
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// An executor failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecutionFailure { tool: String, message: String },

    /// Calendar backend failure
    #[error("calendar error: {0}")]
    Calendar(String),

    /// Conversation persistence failure
    #[error("conversation store error: {0}")]
    Store(String),

    /// Roster lookup failure
    #[error("roster error: {0}")]
    Roster(String),
}

impl Error {
    /// Create a tool execution failure
    pub fn tool_failure(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecutionFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether the retry policy may try this operation again
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ProviderTransient(_))
    }
}

impl From<huddle_ai::Error> for Error {
    fn from(e: huddle_ai::Error) -> Self {
        if e.is_retryable() {
            Error::ProviderTransient(e)
        } else {
            Error::ProviderPermanent(e)
        }
    }
}
