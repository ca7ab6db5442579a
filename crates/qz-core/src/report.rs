//! Status and log views.
//!
//! The log groups activities by the calendar date of their start and renders a
//! fixed-width tree:
//!
//! ```text
//! 2024-01-01                                                                       1:30:00
//! ├ write report [acme]                                           │ 09:00-10:00 │ 1f0c9a2e
//! └ {}                                                            │ 10:30-now   │ 7d3b01aa
//! ```

use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::activity::Activity;
use crate::lifecycle::{State, TrackError, Tracker};
use crate::store::IntervalStore;
use crate::time::format_elapsed;

/// Days covered by `log` when `--since` is omitted.
pub const DEFAULT_LOG_DAYS: u32 = 7;

const DESCRIPTION_WIDTH: usize = 61;
const HEADER_TOTAL_WIDTH: usize = 78;
const TIME_FORMAT: &str = "%H:%M";

/// Whether an activity is currently being tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    Tracking {
        activity: Activity,
        elapsed: TimeDelta,
    },
}

/// Reads the current status without side effects.
pub fn status<S: IntervalStore + ?Sized>(
    store: &S,
    now: NaiveDateTime,
) -> Result<Status, TrackError> {
    let tracker = Tracker::new(store, now);
    Ok(match tracker.state()? {
        State::Tracking(activity) => Status::Tracking {
            elapsed: activity.span().duration(tracker.now()),
            activity,
        },
        State::Idle => Status::Idle,
    })
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "no tracking ongoing"),
            Self::Tracking { activity, elapsed } => write!(
                f,
                "tracking {} for {}",
                activity.describe(),
                format_elapsed(*elapsed)
            ),
        }
    }
}

/// Half-open window `[since, until)` selected by `log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRange {
    pub since: NaiveDateTime,
    pub until: NaiveDateTime,
}

impl LogRange {
    /// Fills omitted bounds: midnight `days` days ago and `now`.
    pub fn resolve(
        since: Option<NaiveDateTime>,
        until: Option<NaiveDateTime>,
        now: NaiveDateTime,
        days: u32,
    ) -> Self {
        let since = since.unwrap_or_else(|| {
            let first_day = now
                .date()
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN);
            first_day.and_hms_opt(0, 0, 0).unwrap_or(now)
        });
        Self {
            since,
            until: until.unwrap_or(now),
        }
    }
}

/// Activities sharing a start date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayLog {
    pub date: NaiveDate,
    pub total_seconds: i64,
    pub activities: Vec<Activity>,
}

impl DayLog {
    pub const fn total(&self) -> TimeDelta {
        TimeDelta::seconds(self.total_seconds)
    }
}

/// The grouped result of a `log` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub days: Vec<DayLog>,
}

/// Queries the store and groups the result by day.
pub fn log<S: IntervalStore + ?Sized>(
    store: &S,
    range: LogRange,
    now: NaiveDateTime,
) -> Result<Report, TrackError> {
    let activities = store.query(range.since, range.until, now)?;
    tracing::debug!(
        since = %range.since,
        until = %range.until,
        count = activities.len(),
        "queried activities"
    );
    Ok(build_report(activities, now))
}

/// Groups activities by the date of their start, earliest first.
///
/// Open activities count until `now` in the day total.
pub fn build_report(mut activities: Vec<Activity>, now: NaiveDateTime) -> Report {
    activities.sort_by_key(|activity| activity.start);

    let mut days: Vec<DayLog> = Vec::new();
    for activity in activities {
        let date = activity.start.date();
        let seconds = activity.span().duration(now).num_seconds();
        match days.last_mut() {
            Some(day) if day.date == date => {
                day.total_seconds += seconds;
                day.activities.push(activity);
            }
            _ => days.push(DayLog {
                date,
                total_seconds: seconds,
                activities: vec![activity],
            }),
        }
    }

    Report { days }
}

fn format_range(activity: &Activity) -> String {
    let start = activity.start.format(TIME_FORMAT);
    match activity.stop {
        Some(stop) => format!("{start}-{}", stop.format(TIME_FORMAT)),
        None => format!("{start}-now  "),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days.is_empty() {
            return writeln!(f, "no recorded activities");
        }

        for (i, day) in self.days.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(
                f,
                "{}{:>width$}",
                day.date,
                format_elapsed(day.total()),
                width = HEADER_TOTAL_WIDTH
            )?;

            let last = day.activities.len().saturating_sub(1);
            for (j, activity) in day.activities.iter().enumerate() {
                let connector = if j == last { '└' } else { '├' };
                writeln!(
                    f,
                    "{connector} {:<width$.width$} │ {} │ {}",
                    activity.describe(),
                    format_range(activity),
                    activity.id.short(),
                    width = DESCRIPTION_WIDTH
                )?;
            }
        }
        Ok(())
    }
}
