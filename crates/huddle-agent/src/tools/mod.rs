//! Calendar tools offered to the model

mod clarify;
mod conflicts;
mod create;
mod delete;
mod free_time;
mod list;
mod search;
mod update;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::json;

pub use clarify::ClarificationTool;
pub use conflicts::CheckConflictsTool;
pub use create::CreateEventTool;
pub use delete::DeleteEventTool;
pub use free_time::FindFreeTimeTool;
pub use list::ListEventsTool;
pub use search::SearchEventsTool;
pub use update::UpdateEventTool;

use crate::attendees::RosterProvider;
use crate::calendar::{CalendarBackend, CalendarEvent};
use crate::datetime::DateTimeResolver;
use crate::error::Error;
use crate::registry::ToolRegistry;
use crate::tool::ToolContext;

pub const CREATE_EVENT: &str = "create_calendar_event";
pub const LIST_EVENTS: &str = "list_calendar_events";
pub const CHECK_CONFLICTS: &str = "check_calendar_conflicts";
pub const UPDATE_EVENT: &str = "update_calendar_event";
pub const DELETE_EVENT: &str = "delete_calendar_event";
pub const SEARCH_EVENTS: &str = "search_calendar_events";
pub const FIND_FREE_TIME: &str = "find_free_time";
pub const ASK_FOR_CLARIFICATION: &str = "ask_for_clarification";

/// `status` values the loop reacts to
pub mod status {
    pub const CREATED: &str = "created";
    pub const ATTENDEES_UNRESOLVED: &str = "attendees_unresolved";
    pub const CLARIFICATION_REQUESTED: &str = "clarification_requested";
    pub const UPDATED: &str = "updated";
    pub const DELETED: &str = "deleted";
    pub const NOT_FOUND: &str = "not_found";
    pub const OK: &str = "ok";
}

const DEFAULT_DURATION_MINUTES: u64 = 60;
const MAX_DURATION_MINUTES: u64 = 24 * 60;
const MAX_DAYS_AHEAD: u32 = 365;

/// Register every calendar tool against one backend
pub fn register_calendar_tools(
    registry: &ToolRegistry,
    calendar: Arc<dyn CalendarBackend>,
    roster: Arc<dyn RosterProvider>,
    resolver: DateTimeResolver,
) {
    registry.register(Arc::new(CreateEventTool::new(calendar.clone(), roster, resolver)));
    registry.register(Arc::new(ListEventsTool::new(calendar.clone(), resolver)));
    registry.register(Arc::new(CheckConflictsTool::new(calendar.clone(), resolver)));
    registry.register(Arc::new(UpdateEventTool::new(calendar.clone(), resolver)));
    registry.register(Arc::new(DeleteEventTool::new(calendar.clone())));
    registry.register(Arc::new(SearchEventsTool::new(calendar.clone(), resolver)));
    registry.register(Arc::new(FindFreeTimeTool::new(calendar, resolver)));
    registry.register(Arc::new(ClarificationTool));
}

/// JSON shape of an event in tool output
pub fn event_json(event: &CalendarEvent) -> serde_json::Value {
    json!({
        "id": event.id,
        "title": event.title,
        "start": event.start.to_rfc3339(),
        "end": event.end.to_rfc3339(),
        "attendees": event.attendees,
        "description": event.description,
        "link": event.link,
    })
}

fn str_arg<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn duration_arg(args: &serde_json::Value) -> u32 {
    args.get("duration_minutes")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_DURATION_MINUTES)
        .clamp(1, MAX_DURATION_MINUTES) as u32
}

fn u32_arg(args: &serde_json::Value, key: &str, default: u32) -> u32 {
    args.get(key)
        .and_then(|v| v.as_u64())
        .map(|n| n.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(default)
}

/// Look-ahead horizon, capped at a year
fn days_arg(args: &serde_json::Value, default: u32) -> u32 {
    u32_arg(args, "days_ahead", default).min(MAX_DAYS_AHEAD)
}

/// `ctx.now` in the resolver's local offset
fn local_now(resolver: &DateTimeResolver, ctx: &ToolContext) -> DateTime<FixedOffset> {
    ctx.now.with_timezone(&resolver.local_offset())
}

fn backend_failure(tool: &str, error: Error) -> Error {
    tracing::warn!(tool = %tool, error = %error, "calendar backend call failed");
    Error::tool_failure(tool, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendees::{RosterMember, StaticRoster};
    use crate::calendar::{InMemoryCalendar, NewEvent};
    use crate::datetime::ResolverSettings;
    use crate::tool::Tool;
    use chrono::{TimeZone, Utc};

    const ME: &str = "+15550001";

    struct Fixture {
        registry: ToolRegistry,
        calendar: Arc<InMemoryCalendar>,
    }

    fn est() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn fixture() -> Fixture {
        let calendar = Arc::new(InMemoryCalendar::new());
        let roster = Arc::new(StaticRoster::new(vec![
            RosterMember::new("Alex Rivera", Some("alex@example.com"), ME),
            RosterMember::new("Sam Chen", Some("sam@example.com"), "+15550002"),
        ]));
        let resolver = DateTimeResolver::new(ResolverSettings {
            local_offset: est(),
            default_hour: 19,
        });
        let registry = ToolRegistry::new();
        register_calendar_tools(&registry, calendar.clone(), roster, resolver);
        Fixture { registry, calendar }
    }

    fn ctx(message: &str) -> ToolContext {
        ToolContext::new(ME, message, Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap())
    }

    async fn seed(calendar: &InMemoryCalendar, title: &str, day: u32, hour: u32, minute: u32) -> CalendarEvent {
        calendar
            .create_event(NewEvent {
                title: title.to_string(),
                start: est().with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap(),
                duration_minutes: 60,
                attendees: vec![],
                description: None,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_all_tools_registered() {
        let f = fixture();
        let mut names: Vec<String> = f.registry.list().into_iter().map(|t| t.name).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                ASK_FOR_CLARIFICATION,
                CHECK_CONFLICTS,
                CREATE_EVENT,
                DELETE_EVENT,
                FIND_FREE_TIME,
                LIST_EVENTS,
                SEARCH_EVENTS,
                UPDATE_EVENT,
            ]
        );
    }

    #[tokio::test]
    async fn test_create_resolves_time_and_attendees() {
        let f = fixture();
        let result = f
            .registry
            .call(
                CREATE_EVENT,
                json!({"title": "Dinner", "start_time": "tomorrow at 7pm", "attendees": ["Sam"]}),
                &ctx("Schedule dinner with Sam tomorrow at 7pm"),
            )
            .await
            .unwrap();

        assert_eq!(result.status(), Some(status::CREATED));
        assert_eq!(result.output["event"]["start"], "2024-01-11T19:00:00-05:00");
        assert_eq!(result.output["event"]["attendees"], json!(["sam@example.com"]));
        assert_eq!(f.calendar.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_create_corrects_wrong_model_date() {
        let f = fixture();
        let result = f
            .registry
            .call(
                CREATE_EVENT,
                json!({"title": "Dinner", "start_time": "2024-01-14T19:00:00-05:00"}),
                &ctx("dinner tomorrow at 7pm"),
            )
            .await
            .unwrap();

        assert_eq!(result.output["event"]["start"], "2024-01-11T19:00:00-05:00");
        assert_eq!(result.output["corrected"], true);
    }

    #[tokio::test]
    async fn test_create_pauses_on_unknown_attendee() {
        let f = fixture();
        let result = f
            .registry
            .call(
                CREATE_EVENT,
                json!({"title": "Dinner", "start_time": "tomorrow 7pm", "attendees": ["Priya", "Sam"]}),
                &ctx("dinner with Priya and Sam tomorrow 7pm"),
            )
            .await
            .unwrap();

        assert_eq!(result.status(), Some(status::ATTENDEES_UNRESOLVED));
        assert_eq!(result.output["unresolved_names"], json!(["Priya"]));
        assert_eq!(result.output["draft"]["attendees"], json!(["sam@example.com"]));
        assert!(f.calendar.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_check_signals_ready() {
        let f = fixture();
        seed(&f.calendar, "Standup", 11, 19, 0).await;

        let busy = f
            .registry
            .call(CHECK_CONFLICTS, json!({"start_time": "tomorrow 7pm"}), &ctx("dinner tomorrow 7pm"))
            .await
            .unwrap();
        assert_eq!(busy.output["has_conflicts"], true);
        assert_eq!(busy.output["ready_to_create"], false);

        let free = f
            .registry
            .call(
                CHECK_CONFLICTS,
                json!({"start_time": "tomorrow 9pm", "duration_minutes": 30, "title": "Drinks"}),
                &ctx("drinks tomorrow 9pm"),
            )
            .await
            .unwrap();
        assert_eq!(free.output["ready_to_create"], true);
        assert_eq!(free.output["start_time"], "2024-01-11T21:00:00-05:00");
        assert_eq!(free.output["duration_minutes"], 30);
        assert_eq!(free.output["title"], "Drinks");
    }

    #[tokio::test]
    async fn test_search_then_update() {
        let f = fixture();
        let event = seed(&f.calendar, "drop off", 11, 10, 30).await;
        let message = "Move the meeting 'drop off' from tomorrow 10:30am to 1pm";

        let found = f
            .registry
            .call(SEARCH_EVENTS, json!({"query": "drop off"}), &ctx(message))
            .await
            .unwrap();
        assert_eq!(found.output["count"], 1);
        assert_eq!(found.output["events"][0]["id"], event.id.as_str());

        let updated = f
            .registry
            .call(UPDATE_EVENT, json!({"event_id": event.id, "start_time": "1pm"}), &ctx(message))
            .await
            .unwrap();
        assert_eq!(updated.status(), Some(status::UPDATED));
        assert_eq!(updated.output["event"]["start"], "2024-01-11T13:00:00-05:00");
    }

    #[tokio::test]
    async fn test_update_without_fields_is_error_result() {
        let f = fixture();
        let event = seed(&f.calendar, "Dinner", 11, 19, 0).await;
        let result = f
            .registry
            .call(UPDATE_EVENT, json!({"event_id": event.id}), &ctx("change dinner"))
            .await
            .unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_execution_failure() {
        let f = fixture();
        let err = f
            .registry
            .call(UPDATE_EVENT, json!({"event_id": "nope", "title": "x"}), &ctx("rename"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolExecutionFailure { ref tool, .. } if tool == UPDATE_EVENT));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let f = fixture();
        let event = seed(&f.calendar, "Dinner", 11, 19, 0).await;
        seed(&f.calendar, "Lunch", 12, 12, 0).await;

        let listed = f
            .registry
            .call(LIST_EVENTS, json!({"limit": 1}), &ctx("what's on"))
            .await
            .unwrap();
        assert_eq!(listed.output["count"], 1);
        assert_eq!(listed.output["events"][0]["title"], "Dinner");

        let deleted = f
            .registry
            .call(DELETE_EVENT, json!({"event_id": event.id}), &ctx("cancel dinner"))
            .await
            .unwrap();
        assert_eq!(deleted.status(), Some(status::DELETED));

        let again = f
            .registry
            .call(DELETE_EVENT, json!({"event_id": event.id}), &ctx("cancel dinner"))
            .await
            .unwrap();
        assert_eq!(again.status(), Some(status::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_days_ahead_is_bounded() {
        let f = fixture();
        seed(&f.calendar, "Dinner", 11, 19, 0).await;

        let rejected = f
            .registry
            .call(LIST_EVENTS, json!({"days_ahead": 4_000_000_000u64}), &ctx("what's on my calendar"))
            .await
            .unwrap();
        assert!(rejected.is_error);

        // called directly, the tool clamps instead of overflowing the backend
        let resolver = DateTimeResolver::new(ResolverSettings {
            local_offset: est(),
            default_hour: 19,
        });
        let list = ListEventsTool::new(f.calendar.clone(), resolver);
        let listed = list
            .execute(json!({"days_ahead": 4_000_000_000u64}), &ctx("what's on my calendar"))
            .await
            .unwrap();
        assert_eq!(listed.output["days_ahead"], 365);
        assert_eq!(listed.output["count"], 1);

        let free = FindFreeTimeTool::new(f.calendar.clone(), resolver)
            .execute(json!({"days_ahead": u64::MAX}), &ctx("when am I free"))
            .await
            .unwrap();
        assert!(!free.is_error);
    }

    #[tokio::test]
    async fn test_find_free_time() {
        let f = fixture();
        let result = f
            .registry
            .call(FIND_FREE_TIME, json!({"duration_minutes": 30, "days_ahead": 2}), &ctx("when am I free"))
            .await
            .unwrap();
        let slots = result.output["slots"].as_array().unwrap();
        assert!(!slots.is_empty());
        // now is 07:00 local, so the first slot opens at 09:00
        assert_eq!(slots[0]["start"], "2024-01-10T09:00:00-05:00");
    }

    #[tokio::test]
    async fn test_clarification() {
        let f = fixture();
        let result = f
            .registry
            .call(ASK_FOR_CLARIFICATION, json!({"question": "Which Sam?"}), &ctx("dinner with Sam"))
            .await
            .unwrap();
        assert_eq!(result.status(), Some(status::CLARIFICATION_REQUESTED));
        assert_eq!(result.output["question"], "Which Sam?");
    }
}
