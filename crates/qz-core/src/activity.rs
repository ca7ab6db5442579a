//! Activities and the half-open intervals they cover.

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::types::{ActivityId, Message, Project};

/// Placeholder rendered in place of a missing message.
pub const EMPTY_MESSAGE: &str = "{}";

/// A `[start, stop)` interval. A missing `stop` extends to +infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub stop: Option<NaiveDateTime>,
}

impl Span {
    pub const fn open(start: NaiveDateTime) -> Self {
        Self { start, stop: None }
    }

    pub const fn closed(start: NaiveDateTime, stop: NaiveDateTime) -> Self {
        Self {
            start,
            stop: Some(stop),
        }
    }

    /// Returns true if the two spans share any instant.
    ///
    /// Touching boundaries (`self.stop == other.start`) do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        let starts_before_other_ends = other.stop.is_none_or(|stop| self.start < stop);
        let other_starts_before_end = self.stop.is_none_or(|stop| other.start < stop);
        starts_before_other_ends && other_starts_before_end
    }

    /// Upper bound used for durations, `now` for an open span.
    pub fn effective_stop(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.stop.unwrap_or(now)
    }

    /// Elapsed time, never negative.
    pub fn duration(&self, now: NaiveDateTime) -> TimeDelta {
        (self.effective_stop(now) - self.start).max(TimeDelta::zero())
    }
}

/// A persisted activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub id: ActivityId,
    pub message: Option<Message>,
    pub project: Option<Project>,
    pub start: NaiveDateTime,
    pub stop: Option<NaiveDateTime>,
}

impl Activity {
    pub const fn span(&self) -> Span {
        Span {
            start: self.start,
            stop: self.stop,
        }
    }

    pub const fn is_open(&self) -> bool {
        self.stop.is_none()
    }

    /// Human-readable description: the message (or `{}`) plus `[project]` if set.
    pub fn describe(&self) -> String {
        let message = self.message.as_ref().map_or(EMPTY_MESSAGE, Message::as_str);
        match &self.project {
            Some(project) => format!("{message} [{project}]"),
            None => message.to_string(),
        }
    }
}

/// An activity that has not been persisted yet.
///
/// The store assigns an identifier when `id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub id: Option<ActivityId>,
    pub message: Option<Message>,
    pub project: Option<Project>,
    pub start: NaiveDateTime,
    pub stop: Option<NaiveDateTime>,
}

impl NewActivity {
    pub const fn span(&self) -> Span {
        Span {
            start: self.start,
            stop: self.stop,
        }
    }
}
