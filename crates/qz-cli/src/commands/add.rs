//! Add command: record a finished activity in one step.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;
use qz_core::Tracker;
use qz_db::Database;

use super::util::{parse_datetime, parse_labels};
use crate::LabelArgs;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    now: NaiveDateTime,
    labels: &LabelArgs,
    start: &str,
    stop: &str,
) -> Result<()> {
    let labels = parse_labels(labels)?;
    let start = parse_datetime(start, now)?;
    let stop = parse_datetime(stop, now)?;

    let activity = db.atomically(|store| Tracker::new(store, now).add(labels, start, stop))?;
    tracing::info!(id = %activity.id, %start, %stop, "added");

    writeln!(writer, "{}", activity.id)?;
    Ok(())
}
