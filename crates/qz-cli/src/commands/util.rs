//! Shared utilities for CLI commands.

use anyhow::Context;
use chrono::NaiveDateTime;
use qz_core::time::parse_user_datetime;
use qz_core::{Labels, Message, Project};

use crate::LabelArgs;

/// Parse a datetime argument; a bare time refers to the day of `now`.
///
/// Supports:
/// - ISO 8601 date: "2024-01-01"
/// - ISO 8601 datetime: "2024-01-01T09:30", "2024-01-01 09:30:15"
/// - Time of day: "09:30"
pub fn parse_datetime(s: &str, now: NaiveDateTime) -> anyhow::Result<NaiveDateTime> {
    Ok(parse_user_datetime(s, now.date())?)
}

/// Parse an optional datetime argument.
pub fn parse_optional_datetime(
    s: Option<&str>,
    now: NaiveDateTime,
) -> anyhow::Result<Option<NaiveDateTime>> {
    s.map(|s| parse_datetime(s, now)).transpose()
}

/// Validate `-m`/`-p` values. Empty strings are rejected.
pub fn parse_labels(args: &LabelArgs) -> anyhow::Result<Labels> {
    let message = args
        .message
        .as_deref()
        .map(Message::new)
        .transpose()
        .context("invalid --message")?;
    let project = args
        .project
        .as_deref()
        .map(Project::new)
        .transpose()
        .context("invalid --project")?;
    Ok(Labels { message, project })
}
