//! Log command: recorded activities grouped by day.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;
use qz_core::report::{self, LogRange};
use qz_db::Database;

use super::util::parse_optional_datetime;

/// Options for the log command.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions<'a> {
    pub since: Option<&'a str>,
    pub until: Option<&'a str>,
    pub json: bool,
    /// Window used when `since` is omitted.
    pub days: u32,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    now: NaiveDateTime,
    options: LogOptions<'_>,
) -> Result<()> {
    let range = LogRange::resolve(
        parse_optional_datetime(options.since, now)?,
        parse_optional_datetime(options.until, now)?,
        now,
        options.days,
    );
    let report = report::log(&db.store(), range, now)?;

    if options.json {
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
    } else {
        write!(writer, "{report}")?;
    }
    Ok(())
}
