//! Free-slot finder

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{FIND_FREE_TIME, backend_failure, days_arg, duration_arg, local_now, status};
use crate::calendar::CalendarBackend;
use crate::datetime::DateTimeResolver;
use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

const DEFAULT_DAYS_AHEAD: u32 = 7;
const MAX_SLOTS: usize = 5;

pub struct FindFreeTimeTool {
    calendar: Arc<dyn CalendarBackend>,
    resolver: DateTimeResolver,
}

impl FindFreeTimeTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>, resolver: DateTimeResolver) -> Self {
        Self { calendar, resolver }
    }
}

#[async_trait]
impl Tool for FindFreeTimeTool {
    fn name(&self) -> &str {
        FIND_FREE_TIME
    }

    fn description(&self) -> &str {
        "Suggest open weekday slots between 9am and 5pm."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "duration_minutes": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Slot length in minutes (default 60)"
                },
                "days_ahead": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 365,
                    "description": "How many days ahead to look (default 7)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let duration = duration_arg(&arguments);
        let days_ahead = days_arg(&arguments, DEFAULT_DAYS_AHEAD);

        let slots = self
            .calendar
            .find_free_time(local_now(&self.resolver, ctx), duration, days_ahead, MAX_SLOTS)
            .await
            .map_err(|e| backend_failure(FIND_FREE_TIME, e))?;

        let slots: Vec<serde_json::Value> = slots
            .iter()
            .map(|s| json!({ "start": s.start.to_rfc3339(), "end": s.end.to_rfc3339() }))
            .collect();

        Ok(ToolResult::json(json!({
            "status": status::OK,
            "duration_minutes": duration,
            "slots": slots,
        })))
    }
}
