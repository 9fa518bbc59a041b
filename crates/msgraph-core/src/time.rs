//! Time ranges for list queries.
//!
//! This module provides [`TimeRange`] for bounding mail and calendar queries,
//! and [`parse_time_spec_at`] for turning a user supplied specification such
//! as `last30min`, `yesterday` or `2025-06-15` into one.
//!
//! The parser never reads the clock itself: the current instant is passed in,
//! and its timezone decides where local calendar days begin and end.

use std::sync::LazyLock;

use chrono::{
    DateTime, Days, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    SecondsFormat, TimeZone, Utc,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The forms accepted by [`parse_time_spec_at`], as shown to the user.
pub const ACCEPTED_FORMS: &str =
    "last60min, last6hours, yesterday, today, last7days, or an ISO date string";

static LAST_MINUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^last(\d+)min$").expect("Invalid minutes regex"));
static LAST_HOURS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^last(\d+)hours?$").expect("Invalid hours regex"));
static LAST_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^last(\d+)days?$").expect("Invalid days regex"));

/// Naive date-time layouts, interpreted in the timezone of `now`.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A time specification could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid --since value: \"{input}\". Use formats like: {}.", ACCEPTED_FORMS)]
pub struct TimeSpecError {
    input: String,
}

impl TimeSpecError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input exactly as the user supplied it.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns the list of accepted forms.
    pub fn accepted_forms(&self) -> &'static str {
        ACCEPTED_FORMS
    }
}

/// An absolute time range with an optional upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound, if any.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Creates an open-ended range starting at `start`.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Creates a closed range.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Creates a range from the start of today to the end of the day `days`
    /// days from now, in the timezone of `now`.
    pub fn days_ahead<Tz: TimeZone>(now: &DateTime<Tz>, days: u64) -> Self {
        let today = now.date_naive();
        let last = today.checked_add_days(Days::new(days)).unwrap_or(today);
        let tz = now.timezone();
        Self::between(start_of_day(&tz, today), end_of_day(&tz, last))
    }

    /// Returns `true` if `instant` falls within this range.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && self.end.is_none_or(|end| instant <= end)
    }

    /// Returns the start as an RFC 3339 UTC string with milliseconds.
    pub fn start_iso(&self) -> String {
        format_instant(&self.start)
    }

    /// Returns the end as an RFC 3339 UTC string with milliseconds.
    pub fn end_iso(&self) -> Option<String> {
        self.end.as_ref().map(format_instant)
    }
}

/// Formats an instant as `2025-06-15T11:00:00.000Z`.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns the first millisecond of `date` in `tz`.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// Returns the last millisecond of `date` in `tz`.
pub fn end_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    resolve_local(tz, date.and_time(last))
}

/// Maps a wall-clock time in `tz` to UTC.
///
/// Ambiguous times take the earlier instant; times skipped by a DST gap are
/// moved forward by an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

/// Parses a time specification relative to the local clock.
pub fn parse_time_spec(spec: &str) -> Result<TimeRange, TimeSpecError> {
    parse_time_spec_at(spec, Local::now())
}

/// Parses a time specification relative to `now`.
///
/// Recognized forms, case-insensitive and tried in this order:
///
/// 1. `last<N>min`: N minutes before `now`, open-ended
/// 2. `last<N>hour` / `last<N>hours`
/// 3. `last<N>day` / `last<N>days`
/// 4. `yesterday`: the whole previous local calendar day
/// 5. `today`: from the start of the current local day, open-ended
/// 6. an absolute RFC 3339 timestamp, naive date-time (local), or
///    `YYYY-MM-DD` (UTC midnight)
pub fn parse_time_spec_at<Tz: TimeZone>(
    spec: &str,
    now: DateTime<Tz>,
) -> Result<TimeRange, TimeSpecError> {
    let trimmed = spec.trim();
    let lowered = trimmed.to_lowercase();
    let now_utc = now.with_timezone(&Utc);

    if let Some(n) = capture_count(&LAST_MINUTES, &lowered) {
        return back_from(now_utc, n.and_then(Duration::try_minutes), spec);
    }
    if let Some(n) = capture_count(&LAST_HOURS, &lowered) {
        return back_from(now_utc, n.and_then(Duration::try_hours), spec);
    }
    if let Some(n) = capture_count(&LAST_DAYS, &lowered) {
        return back_from(now_utc, n.and_then(Duration::try_days), spec);
    }

    let tz = now.timezone();
    let today = now.date_naive();
    match lowered.as_str() {
        "yesterday" => {
            let yesterday = today
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| TimeSpecError::new(spec))?;
            return Ok(TimeRange::between(
                start_of_day(&tz, yesterday),
                end_of_day(&tz, yesterday),
            ));
        }
        "today" => return Ok(TimeRange::since(start_of_day(&tz, today))),
        _ => {}
    }

    parse_absolute(trimmed, &tz)
        .map(TimeRange::since)
        .ok_or_else(|| TimeSpecError::new(spec))
}

/// Returns `Some(count)` when `pattern` matches; the inner value is `None`
/// when the digits overflow.
fn capture_count(pattern: &Regex, input: &str) -> Option<Option<i64>> {
    pattern
        .captures(input)
        .map(|caps| caps[1].parse::<i64>().ok())
}

fn back_from(
    now: DateTime<Utc>,
    span: Option<Duration>,
    spec: &str,
) -> Result<TimeRange, TimeSpecError> {
    span.and_then(|span| now.checked_sub_signed(span))
        .map(TimeRange::since)
        .ok_or_else(|| TimeSpecError::new(spec))
}

fn parse_absolute<Tz: TimeZone>(input: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(resolve_local(tz, naive));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn tokyo(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn millis(dt: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
        dt + Duration::milliseconds(ms)
    }

    mod relative {
        use super::*;

        #[test]
        fn last_minutes() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let range = parse_time_spec_at("last60min", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 15, 11, 0, 0));
            assert_eq!(range.end, None);
        }

        #[test]
        fn last_minutes_crosses_midnight() {
            let now = utc(2025, 6, 15, 0, 10, 0);
            let range = parse_time_spec_at("last30min", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 14, 23, 40, 0));
        }

        #[test]
        fn last_zero_minutes_is_now() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let range = parse_time_spec_at("last0min", now).unwrap();
            assert_eq!(range.start, now);
        }

        #[test]
        fn last_hours_singular_and_plural() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let plural = parse_time_spec_at("last6hours", now).unwrap();
            let singular = parse_time_spec_at("last1hour", now).unwrap();
            assert_eq!(plural.start, utc(2025, 6, 15, 6, 0, 0));
            assert_eq!(singular.start, utc(2025, 6, 15, 11, 0, 0));
            assert_eq!(plural.end, None);
        }

        #[test]
        fn last_days_singular_and_plural() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let plural = parse_time_spec_at("last7days", now).unwrap();
            let singular = parse_time_spec_at("last1day", now).unwrap();
            assert_eq!(plural.start, utc(2025, 6, 8, 12, 0, 0));
            assert_eq!(singular.start, utc(2025, 6, 14, 12, 0, 0));
        }

        #[test]
        fn case_insensitive() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            assert_eq!(
                parse_time_spec_at("Last30Min", now).unwrap(),
                parse_time_spec_at("last30min", now).unwrap()
            );
            assert_eq!(
                parse_time_spec_at("LAST2HOURS", now).unwrap().start,
                utc(2025, 6, 15, 10, 0, 0)
            );
        }

        #[test]
        fn overflowing_count_is_rejected() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            assert!(parse_time_spec_at("last99999999999999999999min", now).is_err());
            assert!(parse_time_spec_at("last9999999999days", now).is_err());
        }
    }

    mod calendar_days {
        use super::*;

        #[test]
        fn yesterday_spans_previous_day_utc() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let range = parse_time_spec_at("yesterday", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 14, 0, 0, 0));
            assert_eq!(range.end, Some(millis(utc(2025, 6, 14, 23, 59, 59), 999)));
        }

        #[test]
        fn yesterday_uses_local_day() {
            // 01:30 in Tokyo is still the previous day in UTC.
            let now = tokyo(2025, 6, 15, 1, 30);
            let range = parse_time_spec_at("YESTERDAY", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 13, 15, 0, 0));
            assert_eq!(range.end, Some(millis(utc(2025, 6, 14, 14, 59, 59), 999)));
        }

        #[test]
        fn yesterday_at_month_boundary() {
            let now = utc(2025, 3, 1, 8, 0, 0);
            let range = parse_time_spec_at("yesterday", now).unwrap();
            assert_eq!(range.start, utc(2025, 2, 28, 0, 0, 0));
        }

        #[test]
        fn today_is_open_ended() {
            let now = tokyo(2025, 6, 15, 18, 45);
            let range = parse_time_spec_at("today", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 14, 15, 0, 0));
            assert_eq!(range.end, None);
        }

        #[test]
        fn days_ahead_covers_whole_days() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let range = TimeRange::days_ahead(&now, 7);
            assert_eq!(range.start, utc(2025, 6, 15, 0, 0, 0));
            assert_eq!(range.end, Some(millis(utc(2025, 6, 22, 23, 59, 59), 999)));
        }
    }

    mod absolute {
        use super::*;

        #[test]
        fn rfc3339_with_offset() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let range = parse_time_spec_at("2025-06-10T09:30:00+02:00", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 10, 7, 30, 0));
            assert_eq!(range.end, None);
        }

        #[test]
        fn rfc3339_zulu() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let range = parse_time_spec_at("2025-06-10T09:30:00.000Z", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 10, 9, 30, 0));
        }

        #[test]
        fn bare_date_is_utc_midnight() {
            let now = tokyo(2025, 6, 15, 12, 0);
            let range = parse_time_spec_at("2025-06-10", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 10, 0, 0, 0));
        }

        #[test]
        fn naive_datetime_is_local() {
            let now = tokyo(2025, 6, 15, 12, 0);
            let range = parse_time_spec_at("2025-06-10T09:00", now).unwrap();
            assert_eq!(range.start, utc(2025, 6, 10, 0, 0, 0));

            let spaced = parse_time_spec_at("2025-06-10 09:00:30", now).unwrap();
            assert_eq!(spaced.start, utc(2025, 6, 10, 0, 0, 30));
        }
    }

    mod invalid {
        use super::*;

        #[test]
        fn empty_string() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            assert!(parse_time_spec_at("", now).is_err());
            assert!(parse_time_spec_at("   ", now).is_err());
        }

        #[test]
        fn unknown_word() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let err = parse_time_spec_at("invalidvalue", now).unwrap_err();
            assert_eq!(err.input(), "invalidvalue");
        }

        #[test]
        fn incomplete_relative_forms() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            for spec in ["lastmin", "last-5min", "last5", "last5weeks", "2025-13-45"] {
                assert!(parse_time_spec_at(spec, now).is_err(), "{spec} should fail");
            }
        }

        #[test]
        fn message_lists_accepted_forms() {
            let now = utc(2025, 6, 15, 12, 0, 0);
            let err = parse_time_spec_at("soon", now).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid --since value: \"soon\". Use formats like: last60min, last6hours, \
                 yesterday, today, last7days, or an ISO date string."
            );
        }
    }

    mod range {
        use super::*;

        #[test]
        fn closed_ranges_are_ordered() {
            for now in [utc(2025, 1, 1, 0, 0, 0), utc(2024, 2, 29, 23, 59, 59)] {
                let range = parse_time_spec_at("yesterday", now).unwrap();
                assert!(range.start <= range.end.unwrap());
            }
            let ahead = TimeRange::days_ahead(&utc(2025, 1, 1, 0, 0, 0), 0);
            assert!(ahead.start <= ahead.end.unwrap());
        }

        #[test]
        fn iso_strings_have_millis() {
            let range = TimeRange::between(utc(2025, 6, 15, 11, 0, 0), utc(2025, 6, 15, 12, 0, 0));
            assert_eq!(range.start_iso(), "2025-06-15T11:00:00.000Z");
            assert_eq!(range.end_iso().as_deref(), Some("2025-06-15T12:00:00.000Z"));
        }

        #[test]
        fn contains_respects_bounds() {
            let range = TimeRange::between(utc(2025, 6, 15, 11, 0, 0), utc(2025, 6, 15, 12, 0, 0));
            assert!(range.contains(utc(2025, 6, 15, 11, 30, 0)));
            assert!(!range.contains(utc(2025, 6, 15, 12, 0, 1)));
            assert!(TimeRange::since(utc(2025, 6, 15, 11, 0, 0)).contains(utc(2030, 1, 1, 0, 0, 0)));
        }
    }
}
