//! Storage layer for qz.
//!
//! Implements the [`IntervalStore`] contract on top of `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Each CLI invocation opens one `Database`, performs one operation and drops it.
//!
//! # Atomicity
//!
//! [`Database::atomically`] runs a closure inside a `BEGIN IMMEDIATE` transaction.
//! Concurrent invocations serialize on the write lock, so a validate-then-write
//! sequence cannot interleave with another writer. A writer still waiting when
//! the busy timeout expires fails with a constraint violation. Returning an
//! error from the closure rolls the transaction back.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are naive local time stored as TEXT in `YYYY-MM-DDTHH:MM:SS` form.
//! The fixed width keeps lexicographic ordering equal to chronological ordering.
//!
//! ## Invariants
//!
//! The schema enforces the activity invariants independently of the engine:
//! - a partial unique index allows at most one row with `stop_dt IS NULL`
//! - `CHECK` constraints reject empty labels and `stop_dt <= start_dt`
//! - `BEFORE INSERT` / `BEFORE UPDATE` triggers abort on overlapping intervals
//!   and on timestamps later than the current local time
//!
//! The `running_activity` view exposes the open row for direct queries.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params};
use thiserror::Error;
use uuid::Uuid;

use qz_core::{
    Activity, ActivityId, IntervalStore, Message, NewActivity, Project, Span, StoreError,
    ValidationError,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// How long a writer waits for the lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `PRAGMA integrity_check` reported a problem.
    #[error("database did not pass integrity check: {0}")]
    Integrity(String),
    /// The referenced activity does not exist.
    #[error("no activity `{0}`")]
    NotFound(ActivityId),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for activity {id}: {timestamp}")]
    TimestampParse {
        id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value failed domain validation.
    #[error("invalid value in activities table")]
    Validation(#[from] ValidationError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, message))
                if matches!(
                    failure.code,
                    ErrorCode::ConstraintViolation
                        | ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                ) =>
            {
                Self::ConstraintViolation(message.unwrap_or_else(|| failure.to_string()))
            }
            DbError::NotFound(id) => Self::NotFound(id),
            other => Self::Backend(Box::new(other)),
        }
    }
}

fn store_error<E: From<StoreError>>(err: rusqlite::Error) -> E {
    E::from(StoreError::from(DbError::from(err)))
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// An existing file is integrity-checked first. The schema is initialized on
    /// every open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens a database whose writers wait at most `busy_timeout` for the lock.
    pub fn open_with_busy_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        let existed = path.exists();
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self { conn };
        if existed {
            db.check_integrity()?;
        }
        db.init()?;
        tracing::debug!(path = %path.display(), existed, "opened database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS activities (
                uuid TEXT PRIMARY KEY,
                message TEXT,
                project TEXT,
                start_dt TEXT NOT NULL,
                stop_dt TEXT,

                CHECK (message IS NULL OR message != ''),
                CHECK (project IS NULL OR project != ''),
                CHECK (datetime(start_dt) IS NOT NULL),
                CHECK (stop_dt IS NULL OR datetime(stop_dt) IS NOT NULL),
                CHECK (stop_dt IS NULL OR stop_dt > start_dt)
            ) WITHOUT ROWID, STRICT;

            CREATE INDEX IF NOT EXISTS idx_activities_start ON activities(start_dt);

            -- At most one open activity
            CREATE UNIQUE INDEX IF NOT EXISTS single_open_activity
            ON activities(stop_dt IS NULL)
            WHERE stop_dt IS NULL;

            -- Half-open [start_dt, stop_dt) intervals, NULL stop_dt is unbounded
            CREATE TRIGGER IF NOT EXISTS reject_overlap_before_insert
            BEFORE INSERT ON activities
            WHEN EXISTS (
                SELECT 1 FROM activities
                WHERE (NEW.stop_dt IS NULL OR start_dt < NEW.stop_dt)
                  AND (stop_dt IS NULL OR NEW.start_dt < stop_dt)
            )
            BEGIN
                SELECT RAISE(ABORT, 'overlapping activities');
            END;

            CREATE TRIGGER IF NOT EXISTS reject_overlap_before_update
            BEFORE UPDATE OF start_dt, stop_dt ON activities
            WHEN EXISTS (
                SELECT 1 FROM activities
                WHERE uuid != NEW.uuid
                  AND (NEW.stop_dt IS NULL OR start_dt < NEW.stop_dt)
                  AND (stop_dt IS NULL OR NEW.start_dt < stop_dt)
            )
            BEGIN
                SELECT RAISE(ABORT, 'overlapping activities');
            END;

            -- Wall clock of the database host, in local time
            CREATE TRIGGER IF NOT EXISTS reject_future_before_insert
            BEFORE INSERT ON activities
            BEGIN
                SELECT CASE
                    WHEN datetime(NEW.start_dt) > datetime('now', 'localtime')
                        THEN RAISE(ABORT, 'start_dt is in the future')
                    WHEN datetime(NEW.stop_dt) > datetime('now', 'localtime')
                        THEN RAISE(ABORT, 'stop_dt is in the future')
                END;
            END;

            CREATE TRIGGER IF NOT EXISTS reject_future_before_update
            BEFORE UPDATE OF start_dt, stop_dt ON activities
            BEGIN
                SELECT CASE
                    WHEN datetime(NEW.start_dt) > datetime('now', 'localtime')
                        THEN RAISE(ABORT, 'start_dt is in the future')
                    WHEN datetime(NEW.stop_dt) > datetime('now', 'localtime')
                        THEN RAISE(ABORT, 'stop_dt is in the future')
                END;
            END;

            CREATE VIEW IF NOT EXISTS running_activity AS
            SELECT * FROM activities WHERE stop_dt IS NULL;
            ",
        )?;
        Ok(())
    }

    fn check_integrity(&self) -> Result<(), DbError> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if result != "ok" {
            return Err(DbError::Integrity(result));
        }
        Ok(())
    }

    /// Returns a store view running each statement in autocommit mode.
    pub fn store(&self) -> Store<'_> {
        Store { conn: &self.conn }
    }

    /// Runs `f` inside one immediate transaction, committing only on success.
    pub fn atomically<T, E>(&mut self, f: impl FnOnce(&Store<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_error::<E>)?;
        let value = f(&Store { conn: &tx })?;
        tx.commit().map_err(store_error::<E>)?;
        Ok(value)
    }
}

/// An [`IntervalStore`] over a borrowed connection or transaction.
pub struct Store<'conn> {
    conn: &'conn Connection,
}

#[derive(Debug)]
struct ActivityRow {
    uuid: String,
    message: Option<String>,
    project: Option<String>,
    start_dt: String,
    stop_dt: Option<String>,
}

impl ActivityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uuid: row.get(0)?,
            message: row.get(1)?,
            project: row.get(2)?,
            start_dt: row.get(3)?,
            stop_dt: row.get(4)?,
        })
    }

    fn into_activity(self) -> Result<Activity, DbError> {
        let start = parse_timestamp(&self.uuid, &self.start_dt)?;
        let stop = self
            .stop_dt
            .as_deref()
            .map(|stop| parse_timestamp(&self.uuid, stop))
            .transpose()?;
        Ok(Activity {
            id: ActivityId::new(self.uuid)?,
            message: self.message.map(Message::new).transpose()?,
            project: self.project.map(Project::new).transpose()?,
            start,
            stop,
        })
    }
}

impl Store<'_> {
    fn collect(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Activity>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, ActivityRow::from_row)?;
        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?.into_activity()?);
        }
        Ok(activities)
    }

    /// Inserts an activity, generating a UUID v4 when it has no id.
    pub fn insert_activity(&self, activity: &NewActivity) -> Result<ActivityId, DbError> {
        let id = match &activity.id {
            Some(id) => id.clone(),
            None => ActivityId::new(Uuid::new_v4().to_string())?,
        };
        self.conn.execute(
            "
            INSERT INTO activities (uuid, message, project, start_dt, stop_dt)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                id.as_str(),
                activity.message.as_ref().map(Message::as_str),
                activity.project.as_ref().map(Project::as_str),
                format_timestamp(activity.start),
                activity.stop.map(format_timestamp),
            ],
        )?;
        Ok(id)
    }

    /// Returns the open activity, if any.
    pub fn open_activity(&self) -> Result<Option<Activity>, DbError> {
        self.conn
            .query_row(
                "SELECT uuid, message, project, start_dt, stop_dt FROM running_activity",
                [],
                ActivityRow::from_row,
            )
            .optional()?
            .map(ActivityRow::into_activity)
            .transpose()
    }

    pub fn activity_by_id(&self, id: &ActivityId) -> Result<Option<Activity>, DbError> {
        self.conn
            .query_row(
                "
                SELECT uuid, message, project, start_dt, stop_dt
                FROM activities
                WHERE uuid = ?1
                ",
                [id.as_str()],
                ActivityRow::from_row,
            )
            .optional()?
            .map(ActivityRow::into_activity)
            .transpose()
    }

    /// Writes the stop time and labels of an open activity.
    pub fn close_activity(&self, closed: &Activity) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "
            UPDATE activities
            SET message = ?1, project = ?2, stop_dt = ?3
            WHERE uuid = ?4 AND stop_dt IS NULL
            ",
            params![
                closed.message.as_ref().map(Message::as_str),
                closed.project.as_ref().map(Project::as_str),
                closed.stop.map(format_timestamp),
                closed.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound(closed.id.clone()));
        }
        Ok(())
    }

    pub fn delete_activity(&self, id: &ActivityId) -> Result<(), DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM activities WHERE uuid = ?1", [id.as_str()])?;
        if changed == 0 {
            return Err(DbError::NotFound(id.clone()));
        }
        Ok(())
    }

    /// Lists activities intersecting `[since, until)`, open ones bounded by `now`.
    pub fn activities_in_range(
        &self,
        since: NaiveDateTime,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Vec<Activity>, DbError> {
        if until <= since {
            return Ok(Vec::new());
        }
        self.collect(
            "
            SELECT uuid, message, project, start_dt, stop_dt
            FROM activities
            WHERE start_dt < ?2 AND COALESCE(stop_dt, ?3) > ?1
            ORDER BY start_dt ASC, uuid ASC
            ",
            params![
                format_timestamp(since),
                format_timestamp(until),
                format_timestamp(now)
            ],
        )
    }

    /// Lists activities whose id starts with `prefix`.
    pub fn activities_with_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<Activity>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.collect(
            "
            SELECT uuid, message, project, start_dt, stop_dt
            FROM activities
            WHERE substr(uuid, 1, length(?1)) = ?1
            ORDER BY uuid ASC
            LIMIT ?2
            ",
            params![prefix, limit],
        )
    }

    /// Lists activities overlapping `span`.
    pub fn overlapping_activities(&self, span: &Span) -> Result<Vec<Activity>, DbError> {
        self.collect(
            "
            SELECT uuid, message, project, start_dt, stop_dt
            FROM activities
            WHERE (?2 IS NULL OR start_dt < ?2)
              AND (stop_dt IS NULL OR ?1 < stop_dt)
            ORDER BY start_dt ASC, uuid ASC
            ",
            params![format_timestamp(span.start), span.stop.map(format_timestamp)],
        )
    }
}

impl IntervalStore for Store<'_> {
    fn insert(&self, activity: &NewActivity) -> Result<ActivityId, StoreError> {
        Ok(self.insert_activity(activity)?)
    }

    fn get_open(&self) -> Result<Option<Activity>, StoreError> {
        Ok(self.open_activity()?)
    }

    fn get_by_id(&self, id: &ActivityId) -> Result<Option<Activity>, StoreError> {
        Ok(self.activity_by_id(id)?)
    }

    fn update_stop(&self, closed: &Activity) -> Result<(), StoreError> {
        Ok(self.close_activity(closed)?)
    }

    fn delete(&self, id: &ActivityId) -> Result<(), StoreError> {
        Ok(self.delete_activity(id)?)
    }

    fn query(
        &self,
        since: NaiveDateTime,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Vec<Activity>, StoreError> {
        Ok(self.activities_in_range(since, until, now)?)
    }

    fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Activity>, StoreError> {
        Ok(self.activities_with_prefix(prefix, limit)?)
    }

    fn find_overlapping(&self, span: &Span) -> Result<Vec<Activity>, StoreError> {
        Ok(self.overlapping_activities(span)?)
    }
}

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(id: &str, timestamp: &str) -> Result<NaiveDateTime, DbError> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map_err(|source| {
        DbError::TimestampParse {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        }
    })
}
