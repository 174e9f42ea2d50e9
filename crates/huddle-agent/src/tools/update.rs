//! Event update tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{UPDATE_EVENT, backend_failure, event_json, status, str_arg};
use crate::calendar::{CalendarBackend, EventUpdate};
use crate::datetime::DateTimeResolver;
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

pub struct UpdateEventTool {
    calendar: Arc<dyn CalendarBackend>,
    resolver: DateTimeResolver,
}

impl UpdateEventTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>, resolver: DateTimeResolver) -> Self {
        Self { calendar, resolver }
    }
}

#[async_trait]
impl Tool for UpdateEventTool {
    fn name(&self) -> &str {
        UPDATE_EVENT
    }

    fn description(&self) -> &str {
        "Change an existing event's title, start time or length. \
         Use search_calendar_events first to find the event_id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {
                    "type": "string",
                    "description": "Id of the event to change"
                },
                "title": {
                    "type": "string"
                },
                "start_time": {
                    "type": "string",
                    "description": "New start as an ISO 8601 timestamp with offset, or the user's own words"
                },
                "duration_minutes": {
                    "type": "integer",
                    "minimum": 1
                }
            },
            "required": ["event_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let event_id = match str_arg(&arguments, "event_id") {
            Some(id) => id,
            None => return Ok(ToolResult::error("Missing 'event_id' argument")),
        };

        let update = EventUpdate {
            title: str_arg(&arguments, "title").map(str::to_string),
            start: str_arg(&arguments, "start_time")
                .map(|s| self.resolver.resolve_candidate(s, &ctx.message, ctx.now).instant),
            duration_minutes: arguments
                .get("duration_minutes")
                .and_then(|v| v.as_u64())
                .map(|m| m.clamp(1, 24 * 60) as u32),
        };
        if update.is_empty() {
            return Ok(ToolResult::error(
                "Nothing to update: pass title, start_time or duration_minutes",
            ));
        }

        let event = self
            .calendar
            .update_event(event_id, update)
            .await
            .map_err(|e| backend_failure(UPDATE_EVENT, e))?;

        Ok(ToolResult::json(json!({
            "status": status::UPDATED,
            "event": event_json(&event),
        })))
    }
}
