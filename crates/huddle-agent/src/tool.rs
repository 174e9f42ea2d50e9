//! Tool trait and execution

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Per-message context handed to every executor
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Identity of the requester (e.g. a phone number)
    pub identity: String,
    /// The inbound message text, for rules that look back at the user's words
    pub message: String,
    /// Reference clock for the message
    pub now: DateTime<Utc>,
}

impl ToolContext {
    pub fn new(identity: impl Into<String>, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            identity: identity.into(),
            message: message.into(),
            now,
        }
    }
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Structured output returned to the model
    pub output: serde_json::Value,
    /// Whether the execution resulted in an error
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful structured result
    pub fn json(output: serde_json::Value) -> Self {
        Self {
            output,
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }

    /// Read the `status` field, if the output carries one
    pub fn status(&self) -> Option<&str> {
        self.output.get("status").and_then(|v| v.as_str())
    }

    /// Render the output as text for the model
    pub fn text_content(&self) -> String {
        match &self.output {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A completed invocation: what was asked and what came back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: ToolResult,
}

impl ToolOutcome {
    pub fn status(&self) -> Option<&str> {
        self.result.status()
    }
}

/// Trait for executable tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in API calls)
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult>;
}

/// Type alias for a shared tool
pub type BoxedTool = Arc<dyn Tool>;

/// Boxed async executor used by [`FnTool`]
pub type ToolFn = Arc<dyn Fn(serde_json::Value, ToolContext) -> BoxFuture<'static, Result<ToolResult>> + Send + Sync>;

/// A tool assembled from a name, a description, a schema and a closure
pub struct FnTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    executor: ToolFn,
}

impl FnTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        executor: ToolFn,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            executor,
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        (self.executor)(arguments, ctx.clone()).await
    }
}

/// Convert a Tool to a huddle_ai::Tool for API calls
pub fn to_api_tool(tool: &dyn Tool) -> huddle_ai::Tool {
    huddle_ai::Tool {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}
