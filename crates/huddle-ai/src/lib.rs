//! huddle-ai: language-model provider layer
//!
//! This crate defines the request/response types the calendar engine exchanges
//! with a model, the `ModelProvider` trait, and an Anthropic Messages API client.

pub mod error;
pub mod providers;
pub mod types;

pub use error::{Error, Result};
pub use providers::ModelProvider;
pub use types::*;
