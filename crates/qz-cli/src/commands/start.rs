//! Start command.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;
use qz_core::Tracker;
use qz_db::Database;

use super::util::{parse_labels, parse_optional_datetime};
use crate::LabelArgs;

/// Opens a new activity and prints its identifier.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    now: NaiveDateTime,
    labels: &LabelArgs,
    at: Option<&str>,
) -> Result<()> {
    let labels = parse_labels(labels)?;
    let at = parse_optional_datetime(at, now)?;

    let activity = db.atomically(|store| Tracker::new(store, now).start(labels, at))?;
    tracing::info!(id = %activity.id, start = %activity.start, "started");

    writeln!(writer, "{}", activity.id)?;
    Ok(())
}
