//! The interval store contract.
//!
//! The lifecycle and query engines only depend on this trait. The SQLite
//! implementation lives in `qz-db`; callers wrap each engine operation in one
//! store transaction so validation and write are atomic.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::activity::{Activity, NewActivity, Span};
use crate::types::ActivityId;

/// Errors reported by an interval store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing engine rejected a write that would break an invariant,
    /// or a concurrent writer held the lock.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// The referenced record does not exist (or is not open, for `update_stop`).
    #[error("no activity `{0}`")]
    NotFound(ActivityId),
    /// Any other backend failure.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Durable CRUD over activity records.
pub trait IntervalStore {
    /// Persists a new record, assigning an identifier if none is supplied.
    fn insert(&self, activity: &NewActivity) -> Result<ActivityId, StoreError>;

    /// Returns the single open record, if any.
    fn get_open(&self) -> Result<Option<Activity>, StoreError>;

    fn get_by_id(&self, id: &ActivityId) -> Result<Option<Activity>, StoreError>;

    /// Writes `stop` (and the message/project) of a currently open record.
    fn update_stop(&self, closed: &Activity) -> Result<(), StoreError>;

    fn delete(&self, id: &ActivityId) -> Result<(), StoreError>;

    /// Records intersecting `[since, until)`, ordered by start.
    ///
    /// The open record is bounded by `now` for the intersection test.
    fn query(
        &self,
        since: NaiveDateTime,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Vec<Activity>, StoreError>;

    /// Records whose identifier starts with `prefix`, at most `limit` of them.
    fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Activity>, StoreError>;

    /// Records overlapping `span` (see [`Span::overlaps`]), ordered by start.
    fn find_overlapping(&self, span: &Span) -> Result<Vec<Activity>, StoreError>;
}
