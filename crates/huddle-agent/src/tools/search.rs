//! Event search tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{SEARCH_EVENTS, backend_failure, days_arg, event_json, local_now, status, str_arg};
use crate::calendar::CalendarBackend;
use crate::datetime::DateTimeResolver;
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

const DEFAULT_DAYS_AHEAD: u32 = 14;

pub struct SearchEventsTool {
    calendar: Arc<dyn CalendarBackend>,
    resolver: DateTimeResolver,
}

impl SearchEventsTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>, resolver: DateTimeResolver) -> Self {
        Self { calendar, resolver }
    }
}

#[async_trait]
impl Tool for SearchEventsTool {
    fn name(&self) -> &str {
        SEARCH_EVENTS
    }

    fn description(&self) -> &str {
        "Find upcoming events whose title or description contains the query. \
         Use this to get an event_id before updating or deleting an event."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to look for, e.g. \"drop off\""
                },
                "days_ahead": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 365,
                    "description": "How many days ahead to search (default 14)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let query = match str_arg(&arguments, "query") {
            Some(q) => q,
            None => return Ok(ToolResult::error("Missing 'query' argument")),
        };
        let days_ahead = days_arg(&arguments, DEFAULT_DAYS_AHEAD);

        let events = self
            .calendar
            .search_events(query, local_now(&self.resolver, ctx), days_ahead)
            .await
            .map_err(|e| backend_failure(SEARCH_EVENTS, e))?;

        Ok(ToolResult::json(json!({
            "status": status::OK,
            "query": query,
            "count": events.len(),
            "events": events.iter().map(event_json).collect::<Vec<_>>(),
        })))
    }
}
