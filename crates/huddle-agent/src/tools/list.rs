//! Upcoming events tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{LIST_EVENTS, backend_failure, days_arg, event_json, local_now, status, u32_arg};
use crate::calendar::CalendarBackend;
use crate::datetime::DateTimeResolver;
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

const DEFAULT_DAYS_AHEAD: u32 = 7;
const DEFAULT_LIMIT: u32 = 10;

pub struct ListEventsTool {
    calendar: Arc<dyn CalendarBackend>,
    resolver: DateTimeResolver,
}

impl ListEventsTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>, resolver: DateTimeResolver) -> Self {
        Self { calendar, resolver }
    }
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        LIST_EVENTS
    }

    fn description(&self) -> &str {
        "List the user's upcoming calendar events, earliest first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "days_ahead": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 365,
                    "description": "How many days ahead to look (default 7)"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of events (default 10)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let days_ahead = days_arg(&arguments, DEFAULT_DAYS_AHEAD);
        let limit = u32_arg(&arguments, "limit", DEFAULT_LIMIT) as usize;

        let events = self
            .calendar
            .list_events(local_now(&self.resolver, ctx), days_ahead, limit)
            .await
            .map_err(|e| backend_failure(LIST_EVENTS, e))?;

        Ok(ToolResult::json(json!({
            "status": status::OK,
            "count": events.len(),
            "days_ahead": days_ahead,
            "events": events.iter().map(event_json).collect::<Vec<_>>(),
        })))
    }
}
