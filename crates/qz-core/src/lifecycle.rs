//! Activity lifecycle: start, stop, add and delete.
//!
//! The engine tracks a single open-record slot. It is `Idle` when no activity
//! is open and `Tracking` when exactly one is. Every operation validates its
//! temporal constraints against the store before writing, and callers run each
//! operation inside one store transaction.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;

use crate::activity::{Activity, NewActivity, Span};
use crate::store::{IntervalStore, StoreError};
use crate::time::truncate_to_seconds;
use crate::types::{ActivityId, Message, Project};

/// Shortest identifier prefix accepted by [`Tracker::delete`].
pub const MIN_PREFIX_LEN: usize = 4;

/// Lifecycle errors. Each variant family maps to its own exit code.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error(transparent)]
    InvalidState(#[from] StateError),

    #[error(transparent)]
    TemporalViolation(#[from] TemporalError),

    #[error("could not find matching uuid '{0}'")]
    NotFound(String),

    #[error("ambiguous uuid '{0}': use the full identifier")]
    AmbiguousId(String),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("storage failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TrackError {
    /// Process exit code reported for this error.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Backend(_) => 1,
            Self::InvalidState(_) => 3,
            Self::TemporalViolation(_) => 4,
            Self::NotFound(_) => 5,
            Self::AmbiguousId(_) => 6,
            Self::ConstraintViolation(_) => 7,
        }
    }
}

impl From<StoreError> for TrackError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConstraintViolation(reason) => Self::ConstraintViolation(reason),
            StoreError::NotFound(id) => Self::NotFound(id.to_string()),
            StoreError::Backend(source) => Self::Backend(source),
        }
    }
}

/// An operation attempted from the wrong lifecycle state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("an activity is already running")]
    AlreadyRunning { id: ActivityId },
    #[error("no running activity")]
    NotRunning,
}

/// A future timestamp, an inverted interval or an overlap.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemporalError {
    #[error("{field} {at} is in the future")]
    InFuture {
        field: &'static str,
        at: NaiveDateTime,
    },
    #[error("stop {stop} must be after start {start}")]
    NotAfterStart {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },
    #[error("overlapping activities: conflicts with {}", .id.short())]
    Overlap { id: ActivityId },
}

/// Current position in the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Idle,
    Tracking(Activity),
}

/// Optional message and project supplied with an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    pub message: Option<Message>,
    pub project: Option<Project>,
}

/// Arguments for [`Tracker::stop`].
#[derive(Debug, Clone, Default)]
pub struct StopRequest {
    /// Overwrites the open record's labels when set.
    pub labels: Labels,
    pub at: Option<NaiveDateTime>,
    /// Delete the open record instead of closing it.
    pub discard: bool,
}

/// Lifecycle operations bound to a store and an execution instant.
pub struct Tracker<'s, S: ?Sized> {
    store: &'s S,
    now: NaiveDateTime,
}

impl<'s, S: IntervalStore + ?Sized> Tracker<'s, S> {
    pub fn new(store: &'s S, now: NaiveDateTime) -> Self {
        Self {
            store,
            now: truncate_to_seconds(now),
        }
    }

    pub const fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn state(&self) -> Result<State, TrackError> {
        Ok(self
            .store
            .get_open()?
            .map_or(State::Idle, State::Tracking))
    }

    /// Opens a new activity at `at` (default: now). Only valid while idle.
    pub fn start(&self, labels: Labels, at: Option<NaiveDateTime>) -> Result<Activity, TrackError> {
        if let Some(open) = self.store.get_open()? {
            return Err(StateError::AlreadyRunning { id: open.id }.into());
        }

        let start = at.map_or(self.now, truncate_to_seconds);
        self.ensure_not_future("start", start)?;
        self.ensure_no_overlap(&Span::open(start), None)?;

        let new = NewActivity {
            id: None,
            message: labels.message,
            project: labels.project,
            start,
            stop: None,
        };
        let id = self.store.insert(&new)?;
        debug!(%id, %start, "started activity");

        Ok(Activity {
            id,
            message: new.message,
            project: new.project,
            start,
            stop: None,
        })
    }

    /// Closes (or discards) the open activity. Only valid while tracking.
    ///
    /// Returns the activity as closed, or as it was before being discarded.
    pub fn stop(&self, request: StopRequest) -> Result<Activity, TrackError> {
        let open = self.store.get_open()?.ok_or(StateError::NotRunning)?;

        if request.discard {
            self.store.delete(&open.id)?;
            debug!(id = %open.id, "discarded activity");
            return Ok(open);
        }

        let stop = request.at.map_or(self.now, truncate_to_seconds);
        self.ensure_not_future("stop", stop)?;
        if stop <= open.start {
            return Err(TemporalError::NotAfterStart {
                start: open.start,
                stop,
            }
            .into());
        }
        self.ensure_no_overlap(&Span::closed(open.start, stop), Some(&open.id))?;

        let closed = Activity {
            message: request.labels.message.or(open.message),
            project: request.labels.project.or(open.project),
            stop: Some(stop),
            ..open
        };
        self.store.update_stop(&closed)?;
        debug!(id = %closed.id, %stop, "stopped activity");

        Ok(closed)
    }

    /// Records a closed activity in one step, regardless of state.
    pub fn add(
        &self,
        labels: Labels,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Activity, TrackError> {
        let start = truncate_to_seconds(start);
        let stop = truncate_to_seconds(stop);

        if start >= stop {
            return Err(TemporalError::NotAfterStart { start, stop }.into());
        }
        self.ensure_not_future("start", start)?;
        self.ensure_not_future("stop", stop)?;
        self.ensure_no_overlap(&Span::closed(start, stop), None)?;

        let new = NewActivity {
            id: None,
            message: labels.message,
            project: labels.project,
            start,
            stop: Some(stop),
        };
        let id = self.store.insert(&new)?;
        debug!(%id, %start, %stop, "added activity");

        Ok(Activity {
            id,
            message: new.message,
            project: new.project,
            start,
            stop: Some(stop),
        })
    }

    /// Deletes the single activity whose identifier starts with `prefix`.
    ///
    /// The open activity may be deleted too, which returns the engine to idle.
    pub fn delete(&self, prefix: &str) -> Result<Activity, TrackError> {
        if prefix.chars().count() < MIN_PREFIX_LEN {
            return Err(TrackError::AmbiguousId(prefix.to_string()));
        }

        let mut matches = self.store.find_by_prefix(prefix, 2)?;
        if matches.len() > 1 {
            return Err(TrackError::AmbiguousId(prefix.to_string()));
        }
        let Some(activity) = matches.pop() else {
            return Err(TrackError::NotFound(prefix.to_string()));
        };

        self.store.delete(&activity.id)?;
        debug!(id = %activity.id, "deleted activity");
        Ok(activity)
    }

    fn ensure_not_future(&self, field: &'static str, at: NaiveDateTime) -> Result<(), TrackError> {
        if at > self.now {
            return Err(TemporalError::InFuture { field, at }.into());
        }
        Ok(())
    }

    fn ensure_no_overlap(
        &self,
        span: &Span,
        except: Option<&ActivityId>,
    ) -> Result<(), TrackError> {
        let conflict = self
            .store
            .find_overlapping(span)?
            .into_iter()
            .find(|existing| Some(&existing.id) != except);
        match conflict {
            Some(existing) => Err(TemporalError::Overlap { id: existing.id }.into()),
            None => Ok(()),
        }
    }
}
