//! Datetime parsing and formatting for user-facing values.
//!
//! All values are naive local time. Storage and comparisons use whole seconds.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use thiserror::Error;

/// Extended and basic ISO 8601 calendar dates.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

/// Extended and basic ISO 8601 times; hour-only is handled separately.
const TIME_FORMATS: [&str; 4] = ["%H:%M:%S%.f", "%H:%M", "%H%M%S%.f", "%H%M"];

/// A user datetime that matched none of the accepted forms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not parse `{input}` as a datetime")]
pub struct DatetimeParseError {
    pub input: String,
}

/// The current local time, truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

/// Drops sub-second precision.
pub fn truncate_to_seconds(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Parses an ISO 8601 date or datetime, or a bare time on `today`.
///
/// Accepted forms, extended or basic:
/// - `2024-01-01`, `20240101` (midnight)
/// - `2024-01-01T09`, `2024-01-01T09:30`, `2024-01-01 09:30:15`, `20240101T0930`,
///   optionally with a fraction
/// - `09`, `09:30`, `0930`, `09:30:15` (combined with `today`)
///
/// UTC offsets are not accepted; all values are naive local time.
pub fn parse_user_datetime(
    input: &str,
    today: NaiveDate,
) -> Result<NaiveDateTime, DatetimeParseError> {
    let trimmed = input.trim();

    let parsed = match trimmed.split_once(['T', ' ']) {
        Some((date, time)) => parse_date(date)
            .zip(parse_time(time))
            .map(|(date, time)| date.and_time(time)),
        None => parse_date(trimmed)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .or_else(|| parse_time(trimmed).map(|time| today.and_time(time))),
    };

    parsed
        .map(truncate_to_seconds)
        .ok_or_else(|| DatetimeParseError {
            input: input.to_string(),
        })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_hour(s))
}

/// `HH` with minutes and seconds omitted.
fn parse_hour(s: &str) -> Option<NaiveTime> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::from_hms_opt(s.parse().ok()?, 0, 0)
}

/// Formats a duration as `H:MM:SS`, hours unbounded.
pub fn format_elapsed(delta: TimeDelta) -> String {
    let total = delta.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
