//! Anthropic Claude Messages API provider

use std::time::Duration;

use crate::{
    error::{Error, Result},
    providers::ModelProvider,
    types::{Content, Message, ModelRequest, ModelResponse, StopReason, Tool, ToolUse, Usage},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";

/// Anthropic API client
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn build_request(&self, request: &ModelRequest) -> AnthropicRequest {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(convert_tools(&request.tools))
        };

        AnthropicRequest {
            model: request.model.clone(),
            messages: convert_messages(&request.messages),
            max_tokens: request.max_tokens,
            system: request.system_prompt.clone(),
            tools,
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let body = self.build_request(request);
        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!(url = %url, tools = request.tools.len(), "sending model request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { Error::Timeout } else { Error::Http(e) })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), retry_after, &text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| if e.is_timeout() { Error::Timeout } else { Error::Http(e) })?;
        parse_response(&text)
    }
}

/// Map a non-2xx response to an error
fn map_error_status(status: u16, retry_after: Option<u64>, body: &str) -> Error {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let (error_type, message) = match parsed {
        Some(b) => (b.error.error_type, b.error.message),
        None => ("http_error".to_string(), body.trim().to_string()),
    };

    match status {
        429 => Error::RateLimited { retry_after },
        401 | 403 => Error::Auth(message),
        _ => Error::api(status, error_type, message),
    }
}

fn parse_response(body: &str) -> Result<ModelResponse> {
    let parsed: AnthropicResponse = serde_json::from_str(body)?;

    let mut text_blocks = vec![];
    let mut tool_uses = vec![];
    for block in parsed.content {
        match block {
            ResponseBlock::Text { text } => text_blocks.push(text),
            ResponseBlock::ToolUse { id, name, input } => tool_uses.push(ToolUse { id, name, input }),
            ResponseBlock::Other => {}
        }
    }

    if text_blocks.is_empty() && tool_uses.is_empty() && parsed.stop_reason.is_none() {
        return Err(Error::UnexpectedResponse("response had no content".to_string()));
    }

    Ok(ModelResponse {
        text_blocks,
        tool_uses,
        stop_reason: map_stop_reason(parsed.stop_reason.as_deref().unwrap_or("end_turn")),
        usage: Usage {
            input: parsed.usage.input_tokens,
            output: parsed.usage.output_tokens,
        },
    })
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    messages
        .iter()
        .filter_map(|message| {
            let blocks: Vec<serde_json::Value> = message
                .content()
                .iter()
                .filter_map(|c| match c {
                    Content::Text { text } if text.trim().is_empty() => None,
                    Content::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
                    Content::ToolUse { id, name, input } => Some(serde_json::json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input
                    })),
                    Content::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => Some(serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": content,
                        "is_error": is_error
                    })),
                })
                .collect();

            if blocks.is_empty() {
                None
            } else {
                Some(AnthropicMessage {
                    role: message.role().to_string(),
                    content: serde_json::Value::Array(blocks),
                })
            }
        })
        .collect()
}

fn convert_tools(tools: &[Tool]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| {
            let input_schema = if tool.parameters.is_object() {
                let mut schema = tool.parameters.clone();
                if let Some(obj) = schema.as_object_mut() {
                    obj.entry("type").or_insert(serde_json::json!("object"));
                }
                schema
            } else {
                serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                })
            };

            AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema,
            }
        })
        .collect()
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "max_tokens" => StopReason::Length,
        "tool_use" => StopReason::ToolUse,
        _ => StopReason::Stop,
    }
}
