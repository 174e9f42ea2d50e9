//! Deterministic reply text for paths that skip the model

use chrono::{DateTime, FixedOffset};

use crate::tool::ToolOutcome;
use crate::tools::{self, status};

/// Sent when the model stays unavailable after every retry
pub const UNAVAILABLE_REPLY: &str =
    "Sorry, I'm having trouble reaching my scheduling brain right now. Please try again in a few minutes.";

/// Sent for any other failure at the loop boundary
pub const ERROR_REPLY: &str = "Sorry, something went wrong on my end and I couldn't finish that. Please try again.";

/// Sent when the model returns neither text nor tool calls
pub const EMPTY_REPLY: &str = "Sorry, I didn't catch that. What would you like to do with your calendar?";

/// Sent when a tool ran but produced nothing worth saying
pub const DONE_REPLY: &str = "Done.";

const MAX_LISTED: usize = 5;

pub fn format_when(instant: &DateTime<FixedOffset>) -> String {
    instant.format("%a %b %-d at %-I:%M %p").to_string()
}

fn parse_time(value: &serde_json::Value) -> Option<DateTime<FixedOffset>> {
    value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn event_line(event: &serde_json::Value) -> String {
    let title = event["title"].as_str().unwrap_or("(untitled)");
    match parse_time(&event["start"]) {
        Some(start) => format!("{}, {}", title, format_when(&start)),
        None => title.to_string(),
    }
}

/// Ask for the addresses we could not find
pub fn ask_for_emails(unresolved: &[String]) -> String {
    match unresolved {
        [one] => format!("I don't have an email for {}. What's their email address?", one),
        many => format!(
            "I don't have emails for {}. Can you send their email addresses?",
            many.join(", ")
        ),
    }
}

pub fn no_match(query: &str) -> String {
    format!("I couldn't find anything matching \"{}\" on your calendar.", query)
}

pub fn several_matches(query: &str, outcome: &ToolOutcome) -> String {
    let lines: Vec<String> = outcome.result.output["events"]
        .as_array()
        .map(|events| events.iter().take(MAX_LISTED).map(event_line).collect())
        .unwrap_or_default();
    format!(
        "I found several events matching \"{}\": {}. Which one did you mean?",
        query,
        lines.join("; ")
    )
}

/// One line describing a single tool outcome
pub fn describe(outcome: &ToolOutcome) -> Option<String> {
    let output = &outcome.result.output;
    if outcome.result.is_error {
        return None;
    }

    match (outcome.name.as_str(), outcome.status()) {
        (tools::CREATE_EVENT, Some(status::CREATED)) => {
            let event = &output["event"];
            let title = event["title"].as_str().unwrap_or("Event");
            let when = parse_time(&event["start"]).map(|t| format_when(&t)).unwrap_or_default();
            let mut line = format!("Booked: {} on {}.", title, when);
            if let Some(link) = event["link"].as_str() {
                line.push_str(&format!(" Link: {}", link));
            }
            Some(line)
        }
        (tools::CREATE_EVENT, Some(status::ATTENDEES_UNRESOLVED)) => {
            let names: Vec<String> = serde_json::from_value(output["unresolved_names"].clone()).unwrap_or_default();
            Some(ask_for_emails(&names))
        }
        (tools::LIST_EVENTS, _) => {
            let events = output["events"].as_array().cloned().unwrap_or_default();
            if events.is_empty() {
                let days = output["days_ahead"].as_u64().unwrap_or(7);
                return Some(format!("Nothing on your calendar in the next {} days.", days));
            }
            let mut text = String::from("Your upcoming events:");
            for event in events.iter().take(MAX_LISTED) {
                text.push_str("\n- ");
                text.push_str(&event_line(event));
            }
            if events.len() > MAX_LISTED {
                text.push_str(&format!("\n...and {} more", events.len() - MAX_LISTED));
            }
            Some(text)
        }
        (tools::CHECK_CONFLICTS, _) => {
            let conflicts = output["conflicts"].as_array().cloned().unwrap_or_default();
            if conflicts.is_empty() {
                Some("That time is free.".to_string())
            } else {
                let titles: Vec<&str> = conflicts.iter().filter_map(|c| c["title"].as_str()).collect();
                Some(format!(
                    "That time overlaps {} event{}: {}.",
                    conflicts.len(),
                    if conflicts.len() == 1 { "" } else { "s" },
                    titles.join(", ")
                ))
            }
        }
        (tools::UPDATE_EVENT, Some(status::UPDATED)) => {
            let event = &output["event"];
            let title = event["title"].as_str().unwrap_or("Event");
            let when = parse_time(&event["start"]).map(|t| format_when(&t)).unwrap_or_default();
            Some(format!("Updated: {} is now {}.", title, when))
        }
        (tools::DELETE_EVENT, Some(status::DELETED)) => Some("Deleted the event.".to_string()),
        (tools::DELETE_EVENT, Some(status::NOT_FOUND)) => Some("That event was already gone.".to_string()),
        (tools::SEARCH_EVENTS, _) => {
            let events = output["events"].as_array().cloned().unwrap_or_default();
            let query = output["query"].as_str().unwrap_or_default();
            if events.is_empty() {
                Some(no_match(query))
            } else {
                let lines: Vec<String> = events.iter().take(MAX_LISTED).map(event_line).collect();
                Some(format!("Found: {}", lines.join("; ")))
            }
        }
        (tools::FIND_FREE_TIME, _) => {
            let slots: Vec<String> = output["slots"]
                .as_array()
                .map(|s| s.iter().filter_map(|slot| parse_time(&slot["start"])).map(|t| format_when(&t)).collect())
                .unwrap_or_default();
            if slots.is_empty() {
                Some("I couldn't find an open slot in that window.".to_string())
            } else {
                Some(format!("Open slots: {}.", slots.join("; ")))
            }
        }
        (tools::ASK_FOR_CLARIFICATION, _) => output["question"].as_str().map(str::to_string),
        _ => None,
    }
}

/// Reply covering every outcome, newest last
pub fn summarize(outcomes: &[ToolOutcome]) -> String {
    let lines: Vec<String> = outcomes.iter().filter_map(describe).collect();
    if lines.is_empty() {
        if outcomes.iter().any(|o| o.result.is_error) {
            ERROR_REPLY.to_string()
        } else {
            DONE_REPLY.to_string()
        }
    } else {
        lines.join("\n")
    }
}
