//! Event creation tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{CREATE_EVENT, backend_failure, duration_arg, event_json, status, str_arg};
use crate::attendees::{RosterProvider, resolve_attendees};
use crate::calendar::{CalendarBackend, NewEvent};
use crate::conversation::EventDraft;
use crate::datetime::DateTimeResolver;
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

/// Creates an event once every requested attendee has an address
pub struct CreateEventTool {
    calendar: Arc<dyn CalendarBackend>,
    roster: Arc<dyn RosterProvider>,
    resolver: DateTimeResolver,
}

impl CreateEventTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>, roster: Arc<dyn RosterProvider>, resolver: DateTimeResolver) -> Self {
        Self {
            calendar,
            roster,
            resolver,
        }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        CREATE_EVENT
    }

    fn description(&self) -> &str {
        "Create a calendar event. Attendee names are matched against the user's contacts; \
         if any name cannot be matched, nothing is created and the unresolved names are returned."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Short event title, e.g. \"Dinner\""
                },
                "start_time": {
                    "type": "string",
                    "description": "Start time as an ISO 8601 timestamp with offset, or the user's own words"
                },
                "duration_minutes": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Length in minutes (default 60)"
                },
                "attendees": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Attendee names or email addresses, excluding the user"
                },
                "description": {
                    "type": "string"
                }
            },
            "required": ["title", "start_time"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let title = match str_arg(&arguments, "title") {
            Some(t) => t.to_string(),
            None => return Ok(ToolResult::error("Missing 'title' argument")),
        };
        let start_arg = match str_arg(&arguments, "start_time") {
            Some(s) => s,
            None => return Ok(ToolResult::error("Missing 'start_time' argument")),
        };
        let requested: Vec<String> = arguments
            .get("attendees")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let start = self.resolver.resolve_candidate(start_arg, &ctx.message, ctx.now);

        let roster = if requested.is_empty() {
            vec![]
        } else {
            self.roster
                .roster_for(&ctx.identity)
                .await
                .map_err(|e| backend_failure(CREATE_EVENT, e))?
        };
        let resolution = resolve_attendees(&requested, &roster, &ctx.identity);

        let draft = EventDraft {
            title,
            start,
            duration_minutes: duration_arg(&arguments),
            attendees: resolution.resolved,
            description: str_arg(&arguments, "description").map(str::to_string),
        };

        if !resolution.unresolved.is_empty() {
            tracing::info!(
                identity = %ctx.identity,
                unresolved = ?resolution.unresolved,
                "attendees unresolved, deferring event creation"
            );
            return Ok(ToolResult::json(json!({
                "status": status::ATTENDEES_UNRESOLVED,
                "draft": draft,
                "unresolved_names": resolution.unresolved,
            })));
        }

        let event = self
            .calendar
            .create_event(NewEvent {
                title: draft.title,
                start: draft.start.instant,
                duration_minutes: draft.duration_minutes,
                attendees: draft.attendees,
                description: draft.description,
            })
            .await
            .map_err(|e| backend_failure(CREATE_EVENT, e))?;

        Ok(ToolResult::json(json!({
            "status": status::CREATED,
            "event": event_json(&event),
            "provenance": start.provenance,
            "corrected": start.corrected,
        })))
    }
}
