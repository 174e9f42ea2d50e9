//! Natural-language date/time resolution.
//!
//! [`DateTimeResolver::resolve`] turns free text such as "dinner tomorrow at 7pm ET"
//! into an absolute instant. It is pure: the reference clock is always passed in,
//! and every input produces a value. Text that matches nothing degrades to the
//! next day at the default hour.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
    Weekday,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which date rule produced a resolved value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    ExplicitIso,
    Tomorrow,
    Today,
    Weekend,
    NextWeek,
    WeekdayName,
    Fallback,
}

/// Where the time-of-day came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSource {
    NumericPattern,
    Keyword,
    Default,
}

/// An absolute instant plus the reasons it was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDateTime {
    pub instant: DateTime<FixedOffset>,
    pub provenance: Provenance,
    pub time_source: TimeSource,
    /// Set when the "tomorrow" correction replaced the date
    #[serde(default)]
    pub corrected: bool,
}

/// Resolver configuration
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    /// Offset applied when the text names no timezone
    pub local_offset: FixedOffset,
    /// Hour used when no time can be found
    pub default_hour: u32,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            local_offset: Utc.fix(),
            default_hour: 19,
        }
    }
}

/// Keyword → hour mappings, scanned in order
const KEYWORD_HOURS: &[(&str, u32)] = &[
    ("morning", 9),
    ("lunch", 12),
    ("noon", 12),
    ("afternoon", 14),
    ("dinner", 18),
    ("evening", 19),
    ("night", 20),
    ("tonight", 20),
];

const TZ_PATTERN: &str = r"et|est|edt|eastern|pt|pst|pdt|pacific|ct|cst|cdt|central|mt|mst|mdt|mountain";

static ISO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?").unwrap()
});

static HM_AMPM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}}):(\d{{2}})\s*(am|pm)\b(?:\s*({TZ_PATTERN})\b)?")).unwrap()
});

static H_AMPM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}})\s*(am|pm)\b(?:\s*({TZ_PATTERN})\b)?")).unwrap()
});

static HM_24: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}}):(\d{{2}})\b(?:\s*({TZ_PATTERN})\b)?")).unwrap()
});

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b").unwrap()
});

static TODAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(today|tonight)\b").unwrap());

static WEEKEND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bweekend\b").unwrap());

static NEXT_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnext\s+week\b").unwrap());

/// Fixed offset for a timezone token
fn timezone_offset(token: &str) -> Option<FixedOffset> {
    let hours = match token {
        "et" | "est" | "eastern" => -5,
        "edt" => -4,
        "ct" | "cst" | "central" => -6,
        "cdt" => -5,
        "mt" | "mst" | "mountain" => -7,
        "mdt" => -6,
        "pt" | "pst" | "pacific" => -8,
        "pdt" => -7,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Parse a machine-formatted timestamp. Values without an offset are read in `local`.
pub fn parse_timestamp(text: &str, local: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let token = ISO_PATTERN.find(text)?.as_str().to_uppercase().replace(' ', "T");

    if let Ok(dt) = DateTime::parse_from_rfc3339(&token) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M%z", "%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&token, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&token, fmt) {
            return Some(at_offset(naive, local));
        }
    }
    None
}

fn at_offset(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    offset
        .from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| naive.and_utc().fixed_offset())
}

/// Days until the next strict occurrence of `target` after `from`
fn days_until(from: Weekday, target: Weekday) -> i64 {
    let diff = (target.num_days_from_monday() as i64 - from.num_days_from_monday() as i64).rem_euclid(7);
    if diff == 0 { 7 } else { diff }
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    name.parse::<Weekday>().ok()
}

/// Time-of-day found in text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimeOfDay {
    hour: u32,
    minute: u32,
    offset: Option<FixedOffset>,
    source: TimeSource,
}

fn to_24h(hour: u32, meridiem: &str) -> Option<u32> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    match (meridiem, hour) {
        ("am", 12) => Some(0),
        ("am", h) => Some(h),
        ("pm", 12) => Some(12),
        ("pm", h) => Some(h + 12),
        _ => None,
    }
}

fn capture_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

fn scan_time(lower: &str) -> Option<TimeOfDay> {
    for caps in HM_AMPM.captures_iter(lower) {
        let (Some(h), Some(m)) = (capture_u32(&caps, 1), capture_u32(&caps, 2)) else {
            continue;
        };
        if let Some(hour) = to_24h(h, &caps[3]).filter(|_| m < 60) {
            let offset = caps.get(4).and_then(|t| timezone_offset(t.as_str()));
            return Some(TimeOfDay { hour, minute: m, offset, source: TimeSource::NumericPattern });
        }
    }

    for caps in H_AMPM.captures_iter(lower) {
        let Some(h) = capture_u32(&caps, 1) else { continue };
        if let Some(hour) = to_24h(h, &caps[2]) {
            let offset = caps.get(3).and_then(|t| timezone_offset(t.as_str()));
            return Some(TimeOfDay { hour, minute: 0, offset, source: TimeSource::NumericPattern });
        }
    }

    for caps in HM_24.captures_iter(lower) {
        let (Some(hour), Some(minute)) = (capture_u32(&caps, 1), capture_u32(&caps, 2)) else {
            continue;
        };
        if hour < 24 && minute < 60 {
            let offset = caps.get(3).and_then(|t| timezone_offset(t.as_str()));
            return Some(TimeOfDay { hour, minute, offset, source: TimeSource::NumericPattern });
        }
    }

    let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
    KEYWORD_HOURS
        .iter()
        .find(|(kw, _)| words.contains(kw))
        .map(|&(_, hour)| TimeOfDay { hour, minute: 0, offset: None, source: TimeSource::Keyword })
}

/// Deterministic text → instant resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeResolver {
    settings: ResolverSettings,
}

impl DateTimeResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn local_offset(&self) -> FixedOffset {
        self.settings.local_offset
    }

    /// Local calendar date of `now`
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.settings.local_offset).date_naive()
    }

    /// Resolve free text against a reference clock.
    pub fn resolve(&self, text: &str, now: DateTime<Utc>) -> ResolvedDateTime {
        let lower = text.to_lowercase();

        if let Some(instant) = parse_timestamp(text, self.settings.local_offset) {
            let resolved = ResolvedDateTime {
                instant,
                provenance: Provenance::ExplicitIso,
                time_source: TimeSource::NumericPattern,
                corrected: false,
            };
            return self.apply_correction(resolved, text, now);
        }

        let (date, provenance) = self.scan_date(&lower, now);
        let time = scan_time(&lower).unwrap_or(TimeOfDay {
            hour: self.settings.default_hour.min(23),
            minute: 0,
            offset: None,
            source: TimeSource::Default,
        });

        let offset = time.offset.unwrap_or(self.settings.local_offset);
        let naive_time = NaiveTime::from_hms_opt(time.hour, time.minute, 0).unwrap_or(NaiveTime::MIN);
        let resolved = ResolvedDateTime {
            instant: at_offset(date.and_time(naive_time), offset),
            provenance,
            time_source: time.source,
            corrected: false,
        };

        tracing::debug!(
            text = %text,
            instant = %resolved.instant,
            provenance = ?resolved.provenance,
            time_source = ?resolved.time_source,
            "resolved date/time"
        );

        self.apply_correction(resolved, text, now)
    }

    /// Resolve a tool argument that may be a timestamp or free text, checking it
    /// against the user's original message.
    pub fn resolve_candidate(&self, candidate: &str, message: &str, now: DateTime<Utc>) -> ResolvedDateTime {
        match parse_timestamp(candidate, self.settings.local_offset) {
            Some(instant) => self.correct(instant, message, now),
            None => {
                let resolved = self.resolve(candidate, now);
                self.apply_correction(resolved, message, now)
            }
        }
    }

    /// If `text` says "tomorrow" and the candidate's date is not tomorrow,
    /// replace the date and keep the time-of-day.
    pub fn correct(&self, candidate: DateTime<FixedOffset>, text: &str, now: DateTime<Utc>) -> ResolvedDateTime {
        let resolved = ResolvedDateTime {
            instant: candidate,
            provenance: Provenance::ExplicitIso,
            time_source: TimeSource::NumericPattern,
            corrected: false,
        };
        self.apply_correction(resolved, text, now)
    }

    fn apply_correction(&self, resolved: ResolvedDateTime, text: &str, now: DateTime<Utc>) -> ResolvedDateTime {
        if !text.to_lowercase().contains("tomorrow") {
            return resolved;
        }

        let tomorrow = self.local_date(now) + Duration::days(1);
        if resolved.instant.date_naive() == tomorrow {
            return resolved;
        }

        let instant = at_offset(tomorrow.and_time(resolved.instant.time()), *resolved.instant.offset());
        tracing::info!(
            from = %resolved.instant,
            to = %instant,
            "corrected date to tomorrow"
        );
        ResolvedDateTime {
            instant,
            provenance: Provenance::Tomorrow,
            time_source: resolved.time_source,
            corrected: true,
        }
    }

    fn scan_date(&self, lower: &str, now: DateTime<Utc>) -> (NaiveDate, Provenance) {
        let today = self.local_date(now);

        if let Some(day) = WEEKDAY
            .captures(lower)
            .and_then(|c| parse_weekday(c.get(1)?.as_str()))
        {
            return (today + Duration::days(days_until(today.weekday(), day)), Provenance::WeekdayName);
        }
        if TODAY.is_match(lower) {
            return (today, Provenance::Today);
        }
        if lower.contains("tomorrow") {
            return (today + Duration::days(1), Provenance::Tomorrow);
        }
        if WEEKEND.is_match(lower) {
            return (today + Duration::days(days_until(today.weekday(), Weekday::Sat)), Provenance::Weekend);
        }
        if NEXT_WEEK.is_match(lower) {
            return (today + Duration::days(days_until(today.weekday(), Weekday::Mon)), Provenance::NextWeek);
        }

        (today + Duration::days(1), Provenance::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn est() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn resolver() -> DateTimeResolver {
        DateTimeResolver::new(ResolverSettings {
            local_offset: est(),
            default_hour: 19,
        })
    }

    /// Wednesday 2024-01-10 12:00 UTC (07:00 local)
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dinner_tomorrow_at_7pm() {
        let r = resolver().resolve("Schedule dinner tomorrow at 7pm", now());
        assert_eq!(r.instant, est().with_ymd_and_hms(2024, 1, 11, 19, 0, 0).unwrap());
        assert_eq!(r.provenance, Provenance::Tomorrow);
        assert_eq!(r.time_source, TimeSource::NumericPattern);
        assert!(!r.corrected);
    }

    #[test]
    fn test_explicit_iso_with_offset() {
        let r = resolver().resolve("start 2024-02-01T15:30:00-08:00", now());
        assert_eq!(r.provenance, Provenance::ExplicitIso);
        assert_eq!(r.instant.to_rfc3339(), "2024-02-01T15:30:00-08:00");
    }

    #[test]
    fn test_explicit_iso_without_offset_uses_local() {
        let r = resolver().resolve("2024-02-01T09:00:00", now());
        assert_eq!(r.instant, est().with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_explicit_iso_zulu() {
        let r = resolver().resolve("2024-02-01T09:00:00Z", now());
        assert_eq!(r.instant.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_weekday_next_strict_occurrence() {
        // now is a Wednesday
        let r = resolver().resolve("lunch friday", now());
        assert_eq!(r.instant.date_naive(), date(2024, 1, 12));
        assert_eq!(r.provenance, Provenance::WeekdayName);
        assert_eq!(r.instant.hour(), 12);
        assert_eq!(r.time_source, TimeSource::Keyword);
    }

    #[test]
    fn test_same_weekday_rolls_a_week() {
        let r = resolver().resolve("meeting wednesday 10am", now());
        assert_eq!(r.instant.date_naive(), date(2024, 1, 17));
        assert_eq!(r.instant.hour(), 10);
    }

    #[test]
    fn test_today_keyword() {
        let r = resolver().resolve("call today at 3:15pm", now());
        assert_eq!(r.instant.date_naive(), date(2024, 1, 10));
        assert_eq!((r.instant.hour(), r.instant.minute()), (15, 15));
        assert_eq!(r.provenance, Provenance::Today);
    }

    #[test]
    fn test_weekend_is_next_saturday() {
        let r = resolver().resolve("family time this weekend", now());
        assert_eq!(r.instant.date_naive(), date(2024, 1, 13));
        assert_eq!(r.provenance, Provenance::Weekend);
        assert_eq!(r.time_source, TimeSource::Default);
        assert_eq!(r.instant.hour(), 19);
    }

    #[test]
    fn test_weekend_on_saturday_rolls_forward() {
        // Saturday 2024-01-13 17:00 UTC
        let saturday = Utc.with_ymd_and_hms(2024, 1, 13, 17, 0, 0).unwrap();
        let r = resolver().resolve("weekend brunch", saturday);
        assert_eq!(r.instant.date_naive(), date(2024, 1, 20));
    }

    #[test]
    fn test_next_week_is_next_monday() {
        let r = resolver().resolve("catch up next week in the morning", now());
        assert_eq!(r.instant.date_naive(), date(2024, 1, 15));
        assert_eq!(r.provenance, Provenance::NextWeek);
        assert_eq!(r.instant.hour(), 9);
    }

    #[test]
    fn test_fallback_date_and_default_time() {
        let r = resolver().resolve("let's get together", now());
        assert_eq!(r.instant, est().with_ymd_and_hms(2024, 1, 11, 19, 0, 0).unwrap());
        assert_eq!(r.provenance, Provenance::Fallback);
        assert_eq!(r.time_source, TimeSource::Default);
    }

    #[test]
    fn test_twenty_four_hour_pattern() {
        let r = resolver().resolve("sync on friday 16:45", now());
        assert_eq!((r.instant.hour(), r.instant.minute()), (16, 45));
    }

    #[test]
    fn test_ampm_edges() {
        let r = resolver().resolve("tomorrow 12am", now());
        assert_eq!(r.instant.hour(), 0);
        let r = resolver().resolve("tomorrow 12pm", now());
        assert_eq!(r.instant.hour(), 12);
    }

    #[test]
    fn test_keyword_order() {
        assert_eq!(resolver().resolve("dinner tonight", now()).instant.hour(), 18);
        assert_eq!(resolver().resolve("movie night", now()).instant.hour(), 20);
        assert_eq!(resolver().resolve("afternoon walk", now()).instant.hour(), 14);
        assert_eq!(resolver().resolve("evening call", now()).instant.hour(), 19);
        assert_eq!(resolver().resolve("noon sync", now()).instant.hour(), 12);
    }

    #[test]
    fn test_eastern_abbreviation_and_name_agree() {
        let a = resolver().resolve("call at 4pm ET", now());
        let b = resolver().resolve("call at 4pm eastern", now());
        assert_eq!(a.instant, b.instant);
        assert_eq!(a.instant.with_timezone(&Utc).hour(), 21);
    }

    #[test]
    fn test_timezone_tokens_map_to_offsets() {
        let pt = resolver().resolve("call at 2:30pm PT", now());
        assert_eq!(pt.instant.offset().local_minus_utc(), -8 * 3600);
        assert_eq!((pt.instant.hour(), pt.instant.minute()), (14, 30));

        let ct = resolver().resolve("9am CT tomorrow", now());
        assert_eq!(ct.instant.offset().local_minus_utc(), -6 * 3600);

        let mt = resolver().resolve("meeting at 6pm mountain", now());
        assert_eq!(mt.instant.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_no_timezone_uses_local_offset() {
        let r = resolver().resolve("call at 1pm", now());
        assert_eq!(r.instant.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_tomorrow_always_lands_on_next_day() {
        let texts = [
            "tomorrow",
            "dinner tomorrow",
            "tomorrow friday at 9am",
            "2024-03-05T10:00:00 tomorrow",
            "tomorrow evening PT",
        ];
        for hour in [0, 5, 11, 17, 23] {
            let reference = Utc.with_ymd_and_hms(2024, 1, 10, hour, 30, 0).unwrap();
            let expected = resolver().local_date(reference) + Duration::days(1);
            for text in texts {
                let r = resolver().resolve(text, reference);
                assert_eq!(r.instant.date_naive(), expected, "text={text} hour={hour}");
            }
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let a = resolver().resolve("Lunch with Sam next week at 12:30pm", now());
        let b = resolver().resolve("Lunch with Sam next week at 12:30pm", now());
        assert_eq!(a, b);
    }

    #[test]
    fn test_correction_fixes_date_and_keeps_time() {
        let wrong = est().with_ymd_and_hms(2024, 1, 15, 19, 30, 0).unwrap();
        let r = resolver().correct(wrong, "dinner tomorrow at 7:30pm", now());
        assert!(r.corrected);
        assert_eq!(r.provenance, Provenance::Tomorrow);
        assert_eq!(r.instant, est().with_ymd_and_hms(2024, 1, 11, 19, 30, 0).unwrap());
    }

    #[test]
    fn test_correction_leaves_right_date_alone() {
        let right = est().with_ymd_and_hms(2024, 1, 11, 8, 0, 0).unwrap();
        let r = resolver().correct(right, "breakfast tomorrow", now());
        assert!(!r.corrected);
        assert_eq!(r.instant, right);
        assert_eq!(r.provenance, Provenance::ExplicitIso);
    }

    #[test]
    fn test_correction_only_when_text_says_tomorrow() {
        let candidate = est().with_ymd_and_hms(2024, 1, 20, 19, 0, 0).unwrap();
        let r = resolver().correct(candidate, "dinner on the 20th", now());
        assert_eq!(r.instant, candidate);
        assert!(!r.corrected);
    }

    #[test]
    fn test_resolve_candidate_free_text() {
        let r = resolver().resolve_candidate("1pm", "Move 'drop off' from tomorrow 10:30am to 1pm", now());
        assert_eq!(r.instant, est().with_ymd_and_hms(2024, 1, 11, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_resolve_candidate_preserves_candidate_offset() {
        let r = resolver().resolve_candidate("2024-01-09T16:00:00-08:00", "call tomorrow at 4pm PT", now());
        assert_eq!(r.instant.to_rfc3339(), "2024-01-11T16:00:00-08:00");
        assert!(r.corrected);
    }

    #[test]
    fn test_parse_timestamp_rejects_plain_text() {
        assert!(parse_timestamp("tomorrow at 7pm", est()).is_none());
        assert!(parse_timestamp("2024-01-11", est()).is_none());
    }

    #[test]
    fn test_invalid_hours_are_skipped() {
        // 13pm is not a valid 12-hour value; the 24-hour pattern is not present either
        let r = resolver().resolve("13pm tomorrow", now());
        assert_eq!(r.time_source, TimeSource::Default);
    }
}
