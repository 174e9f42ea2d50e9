//! Keyword heuristics over raw message text.
//!
//! These run without a model: classifying a message as an action request,
//! pulling a title, attendee names, email addresses and a move target out of it.

use std::sync::LazyLock;

use regex::Regex;

/// The calendar action a message is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Schedule,
    Update,
    List,
}

const SCHEDULING_KEYWORDS: &[&str] = &[
    "schedule",
    "meeting",
    "call",
    "dinner",
    "lunch",
    "breakfast",
    "get together",
    "plan",
    "organize",
    "set up",
    "arrange",
    "family time",
    "catch up",
    "discussion",
];

/// Openers that make a message a new booking whatever follows
const SCHEDULING_VERBS: &[&str] = &["schedule", "set up", "arrange", "organize", "plan", "book"];

const UPDATE_KEYWORDS: &[&str] = &["move", "reschedule", "change", "push", "shift"];

const CANCEL_KEYWORDS: &[&str] = &["cancel", "delete", "remove"];

const LIST_KEYWORDS: &[&str] = &["what's on", "show", "list", "upcoming", "my calendar"];

/// Activity keyword → default title, first match wins
const ACTIVITY_TITLES: &[(&str, &str)] = &[
    ("dinner", "Dinner"),
    ("lunch", "Lunch"),
    ("breakfast", "Breakfast"),
    ("call", "Call"),
    ("meeting", "Meeting"),
];

/// Title used when nothing better can be found
pub const DEFAULT_TITLE: &str = "Get-Together";

/// Words that end a title or name run
const STOP_WORDS: &[&str] = &[
    "tomorrow", "today", "tonight", "at", "on", "next", "this", "with", "for", "from", "to", "and", "in",
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "morning", "afternoon",
    "evening", "night", "noon", "weekend",
];

const NON_NAMES: &[&str] = &["me", "us", "everyone", "family", "the", "my", "our", "team", "i"];

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)["'“‘]([^"'“”‘’]{1,80})["'”’](?:[^\w]|$)"#).unwrap()
});

static ABOUT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\babout\s+(.+)").unwrap());

static WITH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bwith\s+(.+)").unwrap());

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

static UPDATE_TARGET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^.*\sto\s+(.+)$").unwrap());

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfor\s+(an?|\d+(?:\.\d+)?)\s*(hours?|hrs?|h|minutes?|mins?|m)\b").unwrap()
});

fn tokens(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect()
}

/// Single words match whole tokens; phrases match as substrings
fn mentions(lower: &str, toks: &[&str], keyword: &str) -> bool {
    if keyword.contains(' ') || keyword.contains('\'') {
        lower.contains(keyword)
    } else {
        toks.contains(&keyword)
    }
}

fn mentions_any(lower: &str, toks: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| mentions(lower, toks, k))
}

fn opens_with(toks: &[&str], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split(' ').collect();
    toks.len() >= words.len() && toks[..words.len()] == words[..]
}

/// Classify a message as an action request, if it is one.
///
/// Cancellation wording yields `None`: deleting is never done on keywords alone.
pub fn classify(message: &str) -> Option<ActionKind> {
    let lower = message.to_lowercase();
    let toks = tokens(&lower);

    if SCHEDULING_VERBS.iter().any(|verb| opens_with(&toks, verb)) {
        Some(ActionKind::Schedule)
    } else if mentions_any(&lower, &toks, CANCEL_KEYWORDS) {
        None
    } else if mentions_any(&lower, &toks, UPDATE_KEYWORDS) {
        Some(ActionKind::Update)
    } else if mentions_any(&lower, &toks, LIST_KEYWORDS) {
        Some(ActionKind::List)
    } else if mentions_any(&lower, &toks, SCHEDULING_KEYWORDS) {
        Some(ActionKind::Schedule)
    } else {
        None
    }
}

/// First quoted phrase in the message
pub fn quoted_phrase(message: &str) -> Option<String> {
    QUOTED
        .captures(message)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

fn activity_title(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    let toks = tokens(&lower);
    ACTIVITY_TITLES
        .iter()
        .find(|(kw, _)| toks.contains(kw))
        .map(|(_, title)| *title)
}

/// Derive an event title from the message text
pub fn extract_title(message: &str) -> String {
    if let Some(quoted) = quoted_phrase(message) {
        return quoted;
    }

    if let Some(caps) = ABOUT.captures(message) {
        let words: Vec<String> = caps[1]
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .take_while(|w| !w.is_empty() && !STOP_WORDS.contains(&w.to_lowercase().as_str()))
            .take(3)
            .map(title_case)
            .collect();
        if !words.is_empty() {
            return words.join(" ");
        }
    }

    activity_title(message).unwrap_or(DEFAULT_TITLE).to_string()
}

/// Search query for an existing event: a quoted phrase, else an activity word
pub fn extract_search_query(message: &str) -> Option<String> {
    quoted_phrase(message).or_else(|| activity_title(message).map(|t| t.to_lowercase()))
}

/// Capitalised names following "with"
pub fn extract_attendees(message: &str) -> Vec<String> {
    let Some(caps) = WITH.captures(message) else {
        return vec![];
    };

    let mut names = vec![];
    let mut current: Vec<&str> = vec![];

    for raw in caps.get(1).map_or("", |m| m.as_str()).split_whitespace() {
        let ends_clause = raw.ends_with(',') || raw.ends_with('.') || raw.ends_with('!') || raw.ends_with('?');
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-');
        let lower = word.to_lowercase();

        if lower == "and" {
            flush(&mut current, &mut names);
            continue;
        }
        if word.is_empty() || NON_NAMES.contains(&lower.as_str()) {
            flush(&mut current, &mut names);
            if ends_clause {
                break;
            }
            continue;
        }
        if STOP_WORDS.contains(&lower.as_str()) || word.chars().any(|c| c.is_ascii_digit()) {
            break;
        }
        if !word.chars().next().is_some_and(char::is_uppercase) {
            break;
        }

        current.push(word);
        if raw.ends_with(',') {
            flush(&mut current, &mut names);
        } else if ends_clause {
            break;
        }
    }
    flush(&mut current, &mut names);

    names
}

fn flush(current: &mut Vec<&str>, names: &mut Vec<String>) {
    if !current.is_empty() {
        names.push(current.join(" "));
        current.clear();
    }
}

/// Email addresses found anywhere in the message
pub fn extract_emails(message: &str) -> Vec<String> {
    EMAIL
        .find_iter(message)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .collect()
}

/// Text after the last " to ", used as the new time in move requests
pub fn extract_update_target(message: &str) -> Option<String> {
    let caps = UPDATE_TARGET.captures(message)?;
    let target = caps[1].trim().trim_end_matches(['.', '!', '?']);
    (!target.is_empty()).then(|| target.to_string())
}

/// "for 2 hours", "for an hour", "for 45 minutes"
pub fn extract_duration_minutes(message: &str) -> Option<u32> {
    let caps = DURATION.captures(message)?;
    let amount = match caps[1].to_lowercase().as_str() {
        "a" | "an" => 1.0,
        n => n.parse::<f64>().ok()?,
    };
    let unit = caps[2].to_lowercase();
    let minutes = if unit.starts_with('h') { amount * 60.0 } else { amount };
    (1.0..=24.0 * 60.0).contains(&minutes).then_some(minutes.round() as u32)
}
