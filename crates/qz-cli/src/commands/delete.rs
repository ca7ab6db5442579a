//! Delete command.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;
use qz_core::Tracker;
use qz_db::Database;

/// Deletes the activity matching `prefix` and prints its full identifier.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    now: NaiveDateTime,
    prefix: &str,
) -> Result<()> {
    let activity = db.atomically(|store| Tracker::new(store, now).delete(prefix))?;
    tracing::info!(id = %activity.id, "deleted");

    writeln!(writer, "{}", activity.id)?;
    Ok(())
}
