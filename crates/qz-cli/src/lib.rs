//! qz CLI library.
//!
//! Argument definitions, configuration and one module per subcommand. The
//! binary in `main.rs` wires them together.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, LabelArgs};
pub use config::{Config, DATABASE_ENV};
