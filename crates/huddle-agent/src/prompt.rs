//! System prompt assembly

use chrono::{DateTime, FixedOffset, Utc};

use crate::attendees::{RosterMember, roster_summary};
use crate::conversation::ConversationState;

const PERSONA: &str = "\
You are Huddle, a calendar assistant that works over text messages for a family or small team.
You act on requests with tools instead of chatting about them.

Rules:
- To book something, call check_calendar_conflicts, then create_calendar_event when ready_to_create is true.
- To move, rename or cancel an event, call search_calendar_events first and use the event_id it returns.
- Pass times as ISO 8601 timestamps with an offset, computed from the current time below.
- Only list attendees the user named. Never invent email addresses.
- If the request is missing something you cannot infer, call ask_for_clarification.
- Replies are text messages: one or two short sentences, no markdown.";

/// Build the system prompt for one message
pub fn build_system_prompt(
    state: &ConversationState,
    roster: &[RosterMember],
    now: DateTime<Utc>,
    local_offset: FixedOffset,
) -> String {
    let local = now.with_timezone(&local_offset);
    let mut prompt = String::from(PERSONA);

    prompt.push_str("\n\n# Current time\n");
    prompt.push_str(&format!(
        "{} ({})\n",
        local.format("%A, %B %-d, %Y %-I:%M %p"),
        local.to_rfc3339()
    ));

    prompt.push_str("\n# Contacts\n");
    prompt.push_str(&roster_summary(roster, &state.identity));
    prompt.push('\n');

    // The newest entry is the message being answered; it goes in the user turn.
    let earlier = state.history.len().saturating_sub(1);
    if earlier > 0 {
        prompt.push_str("\n# Recent messages from this user\n");
        for entry in state.history.iter().take(earlier) {
            let at = entry.timestamp.with_timezone(&local_offset);
            prompt.push_str(&format!("- [{}] {}\n", at.format("%a %-I:%M %p"), entry.text));
        }
    }

    if let Some(pending) = &state.pending {
        prompt.push_str("\n# Pending\n");
        prompt.push_str(&pending.describe());
        prompt.push('\n');
    }

    prompt
}
