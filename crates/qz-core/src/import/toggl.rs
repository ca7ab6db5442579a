//! Toggl Track detailed CSV export.
//!
//! Only `Description`, `Project`, `Start date`, `Start time`, `End date` and
//! `End time` are read; other columns are ignored.

use std::io::Read;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use super::{ImportError, Importer};
use crate::activity::NewActivity;
use crate::time::truncate_to_seconds;
use crate::types::{Message, Project};

#[derive(Debug, Deserialize)]
struct TogglRow {
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Project", default)]
    project: String,
    #[serde(rename = "Start date")]
    start_date: NaiveDate,
    #[serde(rename = "Start time")]
    start_time: NaiveTime,
    #[serde(rename = "End date")]
    end_date: NaiveDate,
    #[serde(rename = "End time")]
    end_time: NaiveTime,
}

/// Importer for Toggl's CSV export.
#[derive(Debug, Clone, Copy, Default)]
pub struct TogglCsv;

impl Importer for TogglCsv {
    fn parse(&self, reader: &mut dyn Read) -> Result<Vec<NewActivity>, ImportError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for row in csv_reader.deserialize::<TogglRow>() {
            let row = row?;
            records.push(NewActivity {
                id: None,
                message: Message::new(row.description.trim()).ok(),
                project: Project::new(row.project.trim()).ok(),
                start: truncate_to_seconds(row.start_date.and_time(row.start_time)),
                stop: Some(truncate_to_seconds(row.end_date.and_time(row.end_time))),
            });
        }
        Ok(records)
    }
}
