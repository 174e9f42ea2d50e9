//! Per-identity conversation state and its state machine.
//!
//! A [`ConversationState`] carries a bounded rolling history, the last detected
//! intent, and at most one [`PendingState`] describing an unfinished workflow.
//! Setting a pending state always replaces whatever was there.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::ResolvedDateTime;
use crate::tool::ToolOutcome;

/// Coarse intent tag recorded for each inbound message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Query,
    ScheduleMeeting,
    Cancellation,
    Confirmation,
    Denial,
    TimeSpecification,
    #[default]
    General,
}

/// An event that is ready to create once its attendees are known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub start: ResolvedDateTime,
    pub duration_minutes: u32,
    /// Resolved contact addresses
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An unfinished multi-turn workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingState {
    WaitingForEmails {
        draft: EventDraft,
        unresolved_names: Vec<String>,
    },
    AwaitingClarification {
        asked_text: String,
    },
    AwaitingToolConfirmation {
        tool_results: Vec<ToolOutcome>,
    },
}

impl PendingState {
    pub fn phase(&self) -> ConversationPhase {
        match self {
            PendingState::WaitingForEmails { .. } => ConversationPhase::AwaitingEmails,
            PendingState::AwaitingClarification { .. } => ConversationPhase::AwaitingClarification,
            PendingState::AwaitingToolConfirmation { .. } => ConversationPhase::AwaitingToolConfirmation,
        }
    }

    /// Short description for the system prompt
    pub fn describe(&self) -> String {
        match self {
            PendingState::WaitingForEmails { draft, unresolved_names } => format!(
                "Waiting for email addresses for {} before creating \"{}\" at {}.",
                unresolved_names.join(", "),
                draft.title,
                draft.start.instant.to_rfc3339()
            ),
            PendingState::AwaitingClarification { asked_text } => {
                format!("You asked the user: \"{}\"", asked_text)
            }
            PendingState::AwaitingToolConfirmation { tool_results } => {
                let names: Vec<&str> = tool_results.iter().map(|o| o.name.as_str()).collect();
                format!(
                    "You asked the user to confirm after running: {}.",
                    names.join(", ")
                )
            }
        }
    }
}

/// Which state the machine is in; derived from the pending state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    Idle,
    AwaitingEmails,
    AwaitingClarification,
    AwaitingToolConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything remembered about one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub identity: String,
    #[serde(default)]
    pub history: VecDeque<HistoryEntry>,
    #[serde(default)]
    pub last_intent: Intent,
    #[serde(default)]
    pub pending: Option<PendingState>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u64,
}

impl ConversationState {
    pub fn new(identity: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            identity: identity.into(),
            history: VecDeque::new(),
            last_intent: Intent::General,
            pending: None,
            last_activity_at: now,
            message_count: 0,
        }
    }

    pub fn phase(&self) -> ConversationPhase {
        self.pending
            .as_ref()
            .map(PendingState::phase)
            .unwrap_or(ConversationPhase::Idle)
    }

    /// Append an inbound message, keeping only the newest `limit` entries
    pub fn record_message(&mut self, text: &str, now: DateTime<Utc>, limit: usize) {
        self.history.push_back(HistoryEntry {
            text: text.to_string(),
            timestamp: now,
        });
        while self.history.len() > limit {
            self.history.pop_front();
        }
        self.last_intent = detect_intent(text);
        self.last_activity_at = now;
        self.message_count += 1;
    }

    /// Replace the pending state
    pub fn set_pending(&mut self, pending: PendingState) {
        if let Some(previous) = &self.pending {
            tracing::debug!(
                identity = %self.identity,
                from = ?previous.phase(),
                to = ?pending.phase(),
                "replacing pending state"
            );
        }
        self.pending = Some(pending);
    }

    /// Drop the pending state, returning it
    pub fn clear_pending(&mut self) -> Option<PendingState> {
        self.pending.take()
    }
}

fn words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect()
}

fn has_word(words: &[&str], candidates: &[&str]) -> bool {
    candidates.iter().any(|c| words.contains(c))
}

const QUESTION_WORDS: &[&str] = &["when", "what", "where", "who", "how", "list", "show"];

/// Classify a message for `last_intent`
pub fn detect_intent(message: &str) -> Intent {
    let lower = message.trim().to_lowercase();
    let w = words(&lower);

    if lower.starts_with("what meeting") {
        return Intent::Query;
    }
    let starts_with_question = QUESTION_WORDS.iter().any(|q| lower.starts_with(q)) && !lower.starts_with("how about");
    if starts_with_question && !["schedule", "meeting", "event"].iter().any(|k| lower.contains(k)) {
        return Intent::Query;
    }

    const SCHEDULING_PHRASES: &[&str] = &[
        "can we schedule",
        "let's schedule",
        "lets schedule",
        "schedule a",
        "schedule the",
        "schedule our",
    ];
    if SCHEDULING_PHRASES.iter().any(|p| lower.contains(p)) {
        return Intent::ScheduleMeeting;
    }

    if has_word(&w, &["cancel", "delete", "remove", "stop"]) {
        return Intent::Cancellation;
    }

    if ["schedule", "meeting", "event", "book", "plan"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return Intent::ScheduleMeeting;
    }

    if has_word(&w, &["yes", "yeah", "yep", "sure", "ok", "okay"])
        || lower.contains("sounds good")
        || lower.contains("that works")
    {
        return Intent::Confirmation;
    }

    if has_word(&w, &["no", "nope", "nah", "not", "can't", "won't"]) {
        return Intent::Denial;
    }

    if has_word(
        &w,
        &[
            "tomorrow",
            "today",
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
            "pm",
            "am",
            "at",
        ],
    ) {
        return Intent::TimeSpecification;
    }

    if has_word(&w, QUESTION_WORDS) {
        return Intent::Query;
    }

    Intent::General
}

const TOPIC_SHIFT_PHRASES: &[&str] = &[
    "new topic",
    "different topic",
    "something else",
    "also",
    "by the way",
    "btw",
    "another thing",
    "one more thing",
    "oh and",
    "actually",
];

const TOPIC_STARTERS: &[&str] = &["schedule", "can we", "let's", "how about", "what about", "i need to"];

/// Whether a message abandons whatever workflow was pending
pub fn is_new_topic(message: &str) -> bool {
    let lower = message.trim().to_lowercase();
    TOPIC_SHIFT_PHRASES.iter().any(|p| lower.contains(p)) || TOPIC_STARTERS.iter().any(|s| lower.starts_with(s))
}

const CONFIRMATION_MARKERS: &[&str] = &[
    "should i",
    "shall i",
    "would you like me",
    "do you want me",
    "want me to",
    "please confirm",
    "can you confirm",
];

/// Whether a reply asks the user to approve a follow-up action
pub fn has_confirmation_marker(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    CONFIRMATION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether a reply asks the user something
pub fn has_question_marker(reply: &str) -> bool {
    reply.contains('?')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::{Provenance, TimeSource};
    use chrono::{FixedOffset, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Dinner".to_string(),
            start: ResolvedDateTime {
                instant: FixedOffset::west_opt(5 * 3600)
                    .unwrap()
                    .with_ymd_and_hms(2024, 1, 11, 19, 0, 0)
                    .unwrap(),
                provenance: Provenance::Tomorrow,
                time_source: TimeSource::NumericPattern,
                corrected: false,
            },
            duration_minutes: 60,
            attendees: vec![],
            description: None,
        }
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = ConversationState::new("+15550001", now());
        assert_eq!(state.phase(), ConversationPhase::Idle);
        assert_eq!(state.message_count, 0);
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let mut state = ConversationState::new("+15550001", now());
        for i in 0..8 {
            state.record_message(&format!("message {}", i), now(), 5);
        }
        let texts: Vec<&str> = state.history.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["message 3", "message 4", "message 5", "message 6", "message 7"]);
        assert_eq!(state.message_count, 8);
    }

    #[test]
    fn test_set_pending_replaces() {
        let mut state = ConversationState::new("+15550001", now());
        state.set_pending(PendingState::WaitingForEmails {
            draft: draft(),
            unresolved_names: vec!["Priya".into()],
        });
        assert_eq!(state.phase(), ConversationPhase::AwaitingEmails);

        state.set_pending(PendingState::AwaitingClarification {
            asked_text: "Which day?".into(),
        });
        assert_eq!(state.phase(), ConversationPhase::AwaitingClarification);
        assert!(matches!(state.pending, Some(PendingState::AwaitingClarification { .. })));

        assert!(state.clear_pending().is_some());
        assert_eq!(state.phase(), ConversationPhase::Idle);
    }

    #[test]
    fn test_state_serde_roundtrip_keeps_pending() {
        let mut state = ConversationState::new("+15550001", now());
        state.record_message("Dinner with Priya tomorrow", now(), 5);
        state.set_pending(PendingState::WaitingForEmails {
            draft: draft(),
            unresolved_names: vec!["Priya".into()],
        });

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""kind":"waiting_for_emails""#));
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_detect_intent_ordering() {
        assert_eq!(detect_intent("What meetings do I have?"), Intent::Query);
        assert_eq!(detect_intent("when is dinner"), Intent::Query);
        assert_eq!(detect_intent("Can we schedule lunch"), Intent::ScheduleMeeting);
        assert_eq!(detect_intent("cancel that meeting"), Intent::Cancellation);
        assert_eq!(detect_intent("Book dinner tomorrow"), Intent::ScheduleMeeting);
        assert_eq!(detect_intent("yes please"), Intent::Confirmation);
        assert_eq!(detect_intent("nope"), Intent::Denial);
        assert_eq!(detect_intent("tomorrow at 7"), Intent::TimeSpecification);
        assert_eq!(detect_intent("hello there"), Intent::General);
    }

    #[test]
    fn test_new_topic_detection() {
        assert!(is_new_topic("Actually, let's do something else"));
        assert!(is_new_topic("Schedule lunch Friday"));
        assert!(is_new_topic("btw the kids have soccer"));
        assert!(is_new_topic("How about Thursday"));
        assert!(!is_new_topic("priya@example.com"));
        assert!(!is_new_topic("yes that works"));
    }

    #[test]
    fn test_reply_markers() {
        assert!(has_confirmation_marker("Found 2 events. Should I delete both?"));
        assert!(!has_confirmation_marker("Done! Dinner is booked."));
        assert!(has_question_marker("Which day works?"));
        assert!(!has_question_marker("Booked."));
    }

    #[test]
    fn test_describe_pending() {
        let pending = PendingState::WaitingForEmails {
            draft: draft(),
            unresolved_names: vec!["Priya".into()],
        };
        let text = pending.describe();
        assert!(text.contains("Priya"));
        assert!(text.contains("Dinner"));
    }
}
