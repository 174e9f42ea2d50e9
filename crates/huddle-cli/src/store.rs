//! File-backed persistence for conversations and the calendar

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huddle_agent::{CalendarEvent, ConversationState, ConversationStore, Error, InMemoryCalendar, Result};

/// One JSON file per identity
pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, identity: &str) -> PathBuf {
        let name: String = identity
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_') { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

fn store_error(action: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Store(format!("failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn get_or_create(&self, identity: &str, now: DateTime<Utc>) -> Result<ConversationState> {
        let path = self.path_for(identity);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| store_error("parse", &path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConversationState::new(identity, now)),
            Err(e) => Err(store_error("read", &path, e)),
        }
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        let path = self.path_for(&state.identity);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_error("create", &self.dir, e))?;

        let content = serde_json::to_string_pretty(state).map_err(|e| store_error("serialize", &path, e))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| store_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| store_error("replace", &path, e))
    }
}

/// Load the calendar snapshot; a missing file is an empty calendar
pub fn load_calendar(path: &Path) -> anyhow::Result<InMemoryCalendar> {
    if !path.exists() {
        return Ok(InMemoryCalendar::new());
    }
    let content = fs::read_to_string(path)?;
    let events: Vec<CalendarEvent> = serde_json::from_str(&content)?;
    tracing::debug!(path = %path.display(), events = events.len(), "loaded calendar");
    Ok(InMemoryCalendar::from_events(events))
}

pub fn save_calendar(path: &Path, calendar: &InMemoryCalendar) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(&calendar.snapshot())?)?;
    Ok(())
}
