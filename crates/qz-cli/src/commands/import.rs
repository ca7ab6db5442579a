//! Import command for other tools' exports.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use qz_core::Tracker;
use qz_core::import::{Tool, import_all};
use qz_db::Database;

/// Imports every record of `file` in one transaction and prints the new ids.
///
/// The first rejected record aborts the import; nothing is written.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    now: NaiveDateTime,
    tool: Tool,
    file: &Path,
) -> Result<()> {
    let mut reader =
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    let records = tool
        .importer()
        .parse(&mut reader)
        .with_context(|| format!("failed to parse {tool} export {}", file.display()))?;
    tracing::debug!(count = records.len(), %tool, "parsed export");

    let imported = db.atomically(|store| import_all(&Tracker::new(store, now), records))?;

    for activity in &imported {
        writeln!(writer, "{}", activity.id)?;
    }
    Ok(())
}
