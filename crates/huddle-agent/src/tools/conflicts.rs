//! Conflict check tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{CHECK_CONFLICTS, backend_failure, duration_arg, event_json, str_arg};
use crate::calendar::CalendarBackend;
use crate::datetime::DateTimeResolver;
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

/// Reports overlapping events and whether the slot is ready to book
pub struct CheckConflictsTool {
    calendar: Arc<dyn CalendarBackend>,
    resolver: DateTimeResolver,
}

impl CheckConflictsTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>, resolver: DateTimeResolver) -> Self {
        Self { calendar, resolver }
    }
}

#[async_trait]
impl Tool for CheckConflictsTool {
    fn name(&self) -> &str {
        CHECK_CONFLICTS
    }

    fn description(&self) -> &str {
        "Check whether a proposed time overlaps existing events. \
         When ready_to_create is true, call create_calendar_event next."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "start_time": {
                    "type": "string",
                    "description": "Proposed start as an ISO 8601 timestamp with offset, or the user's own words"
                },
                "duration_minutes": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Length in minutes (default 60)"
                },
                "title": {
                    "type": "string",
                    "description": "Title of the event being planned"
                }
            },
            "required": ["start_time"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let start_arg = match str_arg(&arguments, "start_time") {
            Some(s) => s,
            None => return Ok(ToolResult::error("Missing 'start_time' argument")),
        };
        let duration = duration_arg(&arguments);
        let start = self.resolver.resolve_candidate(start_arg, &ctx.message, ctx.now);

        let report = self
            .calendar
            .check_conflicts(start.instant, duration)
            .await
            .map_err(|e| backend_failure(CHECK_CONFLICTS, e))?;

        let mut output = json!({
            "has_conflicts": report.has_conflicts,
            "conflicts": report.conflicts.iter().map(event_json).collect::<Vec<_>>(),
            "ready_to_create": !report.has_conflicts,
            "start_time": start.instant.to_rfc3339(),
            "duration_minutes": duration,
        });
        if let (Some(title), Some(obj)) = (str_arg(&arguments, "title"), output.as_object_mut()) {
            obj.insert("title".to_string(), json!(title));
        }

        Ok(ToolResult::json(output))
    }
}
