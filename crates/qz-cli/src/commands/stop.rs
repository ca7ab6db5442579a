//! Stop command.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;
use qz_core::{StopRequest, Tracker};
use qz_db::Database;

use super::util::{parse_labels, parse_optional_datetime};
use crate::LabelArgs;

/// Closes (or discards) the running activity and prints its identifier.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    now: NaiveDateTime,
    labels: &LabelArgs,
    at: Option<&str>,
    discard: bool,
) -> Result<()> {
    let request = StopRequest {
        labels: parse_labels(labels)?,
        at: parse_optional_datetime(at, now)?,
        discard,
    };

    let activity = db.atomically(|store| Tracker::new(store, now).stop(request))?;
    if discard {
        tracing::info!(id = %activity.id, "discarded");
    } else {
        tracing::info!(id = %activity.id, "stopped");
    }

    writeln!(writer, "{}", activity.id)?;
    Ok(())
}
