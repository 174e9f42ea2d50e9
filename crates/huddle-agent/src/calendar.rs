//! Calendar backend contract and an in-memory implementation

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveTime, Timelike, Weekday};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A stored calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub link: String,
}

impl CalendarEvent {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    fn overlaps(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> bool {
        self.start < end && start < self.end
    }
}

/// Request to create an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub duration_minutes: Option<u32>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.start.is_none() && self.duration_minutes.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub has_conflicts: bool,
    pub conflicts: Vec<CalendarEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

/// Operations every calendar backend provides.
///
/// Tools hold an `Arc<dyn CalendarBackend>` chosen at construction time, so the
/// loop never knows whether it is talking to memory, a REST API or a relay.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn create_event(&self, event: NewEvent) -> Result<CalendarEvent>;

    /// Events starting in `[from, from + days_ahead)`, earliest first
    async fn list_events(&self, from: DateTime<FixedOffset>, days_ahead: u32, limit: usize) -> Result<Vec<CalendarEvent>>;

    async fn check_conflicts(&self, start: DateTime<FixedOffset>, duration_minutes: u32) -> Result<ConflictReport>;

    async fn update_event(&self, id: &str, update: EventUpdate) -> Result<CalendarEvent>;

    /// Returns false when no event had that id
    async fn delete_event(&self, id: &str) -> Result<bool>;

    /// Case-insensitive title/description match within the window
    async fn search_events(&self, query: &str, from: DateTime<FixedOffset>, days_ahead: u32) -> Result<Vec<CalendarEvent>>;

    /// Open weekday slots between 09:00 and 17:00 in `from`'s offset
    async fn find_free_time(
        &self,
        from: DateTime<FixedOffset>,
        duration_minutes: u32,
        days_ahead: u32,
        limit: usize,
    ) -> Result<Vec<FreeSlot>>;
}

const WORKDAY_START_HOUR: u32 = 9;
const WORKDAY_END_HOUR: u32 = 17;
const SLOT_STEP_MINUTES: i64 = 30;
const MAX_FREE_TIME_DAYS: u32 = 366;

/// Mutex-guarded event list
#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<CalendarEvent>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously saved snapshot
    pub fn from_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    /// Copy of every stored event
    pub fn snapshot(&self) -> Vec<CalendarEvent> {
        self.events.lock().clone()
    }

    fn window(
        &self,
        from: DateTime<FixedOffset>,
        days_ahead: u32,
        filter: impl Fn(&CalendarEvent) -> bool,
    ) -> Result<Vec<CalendarEvent>> {
        let until = from
            .checked_add_signed(Duration::days(i64::from(days_ahead)))
            .ok_or_else(|| Error::Calendar(format!("{} days ahead is out of range", days_ahead)))?;
        let mut found: Vec<CalendarEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| e.end > from && e.start < until && filter(e))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start);
        Ok(found)
    }
}

#[async_trait]
impl CalendarBackend for InMemoryCalendar {
    async fn create_event(&self, event: NewEvent) -> Result<CalendarEvent> {
        if event.title.trim().is_empty() {
            return Err(Error::Calendar("event title is empty".to_string()));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let created = CalendarEvent {
            link: format!("https://meet.huddle.local/{}", &id[..12]),
            id,
            title: event.title,
            start: event.start,
            end: event.start + Duration::minutes(i64::from(event.duration_minutes)),
            attendees: event.attendees,
            description: event.description,
        };

        tracing::debug!(id = %created.id, title = %created.title, "created event");
        self.events.lock().push(created.clone());
        Ok(created)
    }

    async fn list_events(&self, from: DateTime<FixedOffset>, days_ahead: u32, limit: usize) -> Result<Vec<CalendarEvent>> {
        let mut events = self.window(from, days_ahead, |_| true)?;
        events.truncate(limit);
        Ok(events)
    }

    async fn check_conflicts(&self, start: DateTime<FixedOffset>, duration_minutes: u32) -> Result<ConflictReport> {
        let end = start + Duration::minutes(i64::from(duration_minutes));
        let mut conflicts: Vec<CalendarEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| e.overlaps(start, end))
            .cloned()
            .collect();
        conflicts.sort_by_key(|e| e.start);

        Ok(ConflictReport {
            has_conflicts: !conflicts.is_empty(),
            conflicts,
        })
    }

    async fn update_event(&self, id: &str, update: EventUpdate) -> Result<CalendarEvent> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::Calendar(format!("no event with id '{}'", id)))?;

        let duration = update
            .duration_minutes
            .map(|m| Duration::minutes(i64::from(m)))
            .unwrap_or(event.end - event.start);
        if let Some(title) = update.title {
            event.title = title;
        }
        if let Some(start) = update.start {
            event.start = start;
        }
        event.end = event.start + duration;

        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> Result<bool> {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| e.id != id);
        Ok(events.len() != before)
    }

    async fn search_events(&self, query: &str, from: DateTime<FixedOffset>, days_ahead: u32) -> Result<Vec<CalendarEvent>> {
        let needle = query.trim().to_lowercase();
        self.window(from, days_ahead, |e| {
            e.title.to_lowercase().contains(&needle)
                || e.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
    }

    async fn find_free_time(
        &self,
        from: DateTime<FixedOffset>,
        duration_minutes: u32,
        days_ahead: u32,
        limit: usize,
    ) -> Result<Vec<FreeSlot>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let days_ahead = days_ahead.min(MAX_FREE_TIME_DAYS);
        let length = Duration::minutes(i64::from(duration_minutes.max(1)));
        let busy = self.window(from, days_ahead + 1, |_| true)?;
        let mut slots = vec![];

        for day in 0..=u64::from(days_ahead) {
            let Some(date) = from.date_naive().checked_add_days(Days::new(day)) else {
                break;
            };
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }

            let (Some(open), Some(close)) = (
                NaiveTime::from_hms_opt(WORKDAY_START_HOUR, 0, 0),
                NaiveTime::from_hms_opt(WORKDAY_END_HOUR, 0, 0),
            ) else {
                continue;
            };
            let Some(mut cursor) = date.and_time(open).and_local_timezone(*from.offset()).single() else {
                continue;
            };
            let Some(day_end) = date.and_time(close).and_local_timezone(*from.offset()).single() else {
                continue;
            };

            if cursor < from {
                // round up to the next half hour
                let past = i64::from(from.minute() % 30);
                cursor = from - Duration::minutes(past) - Duration::seconds(i64::from(from.second()));
                if past > 0 || from.second() > 0 {
                    cursor += Duration::minutes(SLOT_STEP_MINUTES);
                }
            }

            while cursor + length <= day_end {
                let end = cursor + length;
                if !busy.iter().any(|e| e.overlaps(cursor, end)) {
                    slots.push(FreeSlot { start: cursor, end });
                    if slots.len() >= limit {
                        return Ok(slots);
                    }
                    cursor = end;
                } else {
                    cursor += Duration::minutes(SLOT_STEP_MINUTES);
                }
            }
        }

        Ok(slots)
    }
}
