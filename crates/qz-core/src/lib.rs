//! Core domain logic for the qz time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Activities and the half-open intervals they cover
//! - The interval store contract implemented by `qz-db`
//! - The lifecycle engine: start, stop, add, delete
//! - Status and log reports
//! - Importers for other tools' exports

pub mod activity;
pub mod import;
pub mod lifecycle;
pub mod report;
pub mod store;
pub mod time;
pub mod types;

pub use activity::{Activity, NewActivity, Span};
pub use lifecycle::{Labels, State, StopRequest, TrackError, Tracker};
pub use report::{LogRange, Report, Status};
pub use store::{IntervalStore, StoreError};
pub use types::{ActivityId, Message, Project, ValidationError};
