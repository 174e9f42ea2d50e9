//! huddle-agent: calendar orchestration engine
//!
//! This crate turns free-text messages into calendar operations. It combines a
//! deterministic date/time resolver with a model-driven tool-calling loop, and
//! keeps a small conversation state machine per sender.

pub mod attendees;
pub mod calendar;
pub mod conversation;
pub mod datetime;
pub mod error;
pub mod heuristics;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod reply;
pub mod retry;
pub mod store;
pub mod tool;
pub mod tools;

pub use attendees::{AttendeeResolution, RosterMember, RosterProvider, StaticRoster, resolve_attendees};
pub use calendar::{CalendarBackend, CalendarEvent, EventUpdate, InMemoryCalendar, NewEvent};
pub use conversation::{ConversationPhase, ConversationState, EventDraft, Intent, PendingState};
pub use datetime::{DateTimeResolver, Provenance, ResolvedDateTime, ResolverSettings};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use registry::{CallObserver, CallRecord, ToolRegistry, TracingObserver};
pub use retry::RetryPolicy;
pub use store::{ConversationStore, InMemoryConversationStore};
pub use tool::{BoxedTool, FnTool, Tool, ToolContext, ToolFn, ToolOutcome, ToolResult};
pub use tools::register_calendar_tools;
