//! Clarifying-question tool

use async_trait::async_trait;
use serde_json::json;

use super::{ASK_FOR_CLARIFICATION, status, str_arg};
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

/// Lets the model stop and ask the user something instead of guessing
pub struct ClarificationTool;

#[async_trait]
impl Tool for ClarificationTool {
    fn name(&self) -> &str {
        ASK_FOR_CLARIFICATION
    }

    fn description(&self) -> &str {
        "Ask the user a question when the request is missing something you cannot infer. \
         The question is sent to the user as-is."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to send"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        match str_arg(&arguments, "question") {
            Some(question) => Ok(ToolResult::json(json!({
                "status": status::CLARIFICATION_REQUESTED,
                "question": question,
            }))),
            None => Ok(ToolResult::error("Missing 'question' argument")),
        }
    }
}
