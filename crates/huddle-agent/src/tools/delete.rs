//! Event deletion tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{DELETE_EVENT, backend_failure, status, str_arg};
use crate::calendar::CalendarBackend;
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

pub struct DeleteEventTool {
    calendar: Arc<dyn CalendarBackend>,
}

impl DeleteEventTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for DeleteEventTool {
    fn name(&self) -> &str {
        DELETE_EVENT
    }

    fn description(&self) -> &str {
        "Delete an event by id. Use search_calendar_events first to find the id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {
                    "type": "string",
                    "description": "Id of the event to delete"
                }
            },
            "required": ["event_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let event_id = match str_arg(&arguments, "event_id") {
            Some(id) => id,
            None => return Ok(ToolResult::error("Missing 'event_id' argument")),
        };

        let deleted = self
            .calendar
            .delete_event(event_id)
            .await
            .map_err(|e| backend_failure(DELETE_EVENT, e))?;

        Ok(ToolResult::json(json!({
            "status": if deleted { status::DELETED } else { status::NOT_FOUND },
            "event_id": event_id,
        })))
    }
}
