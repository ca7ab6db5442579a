//! Importers for other time trackers' exports.
//!
//! Each tool implements [`Importer`], turning its export into closed
//! [`NewActivity`] records. [`import_all`] feeds them through the same
//! validation as `add`. A batch is all-or-nothing: the first rejected record
//! aborts the import, and callers run it inside one transaction so nothing is
//! persisted.

pub mod toggl;

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use thiserror::Error;

use crate::activity::{Activity, NewActivity};
use crate::lifecycle::{Labels, TrackError, Tracker};
use crate::store::{IntervalStore, StoreError};

pub use toggl::TogglCsv;

/// Errors raised while parsing or importing an export.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read export")]
    Csv(#[from] csv::Error),

    #[error("record {record}: {reason}")]
    InvalidRecord { record: usize, reason: String },

    #[error("record {record} rejected")]
    Rejected {
        record: usize,
        #[source]
        source: TrackError,
    },

    #[error("storage failure during import")]
    Store(#[source] TrackError),
}

impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.into())
    }
}

/// Parses a tool-specific export into closed activities.
pub trait Importer {
    fn parse(&self, reader: &mut dyn Read) -> Result<Vec<NewActivity>, ImportError>;
}

/// Supported source tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Toggl,
}

impl Tool {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Toggl => "toggl",
        }
    }

    pub fn importer(self) -> Box<dyn Importer> {
        match self {
            Self::Toggl => Box::new(TogglCsv),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unsupported tool name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported tool `{0}`")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "toggl" => Ok(Self::Toggl),
            other => Err(UnknownTool(other.to_string())),
        }
    }
}

/// Adds every record through `tracker`, stopping at the first rejection.
///
/// Record numbers in errors are 1-based.
pub fn import_all<S: IntervalStore + ?Sized>(
    tracker: &Tracker<'_, S>,
    records: Vec<NewActivity>,
) -> Result<Vec<Activity>, ImportError> {
    let mut imported = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        let number = idx + 1;
        let Some(stop) = record.stop else {
            return Err(ImportError::InvalidRecord {
                record: number,
                reason: "imported activities must have a stop time".to_string(),
            });
        };
        let labels = Labels {
            message: record.message,
            project: record.project,
        };
        let activity = tracker
            .add(labels, record.start, stop)
            .map_err(|source| ImportError::Rejected {
                record: number,
                source,
            })?;
        imported.push(activity);
    }
    tracing::info!(count = imported.len(), "imported activities");
    Ok(imported)
}
