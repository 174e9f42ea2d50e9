//! Language-model provider implementations

pub mod anthropic;

use crate::{Error, ModelRequest, ModelResponse, Result};
use async_trait::async_trait;

/// Trait for language-model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send a request and wait for the complete response
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse>;
}

/// Get an API key from a provided value or the environment
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided {
        return Ok(key.to_string());
    }

    std::env::var(env_var).map_err(|_| Error::InvalidApiKey)
}
