//! Status command: is anything being tracked right now.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;
use qz_core::report;
use qz_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, now: NaiveDateTime) -> Result<()> {
    let status = report::status(&db.store(), now)?;
    writeln!(writer, "{status}")?;
    Ok(())
}
