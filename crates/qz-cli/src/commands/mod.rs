//! CLI subcommand implementations.

pub mod add;
pub mod delete;
pub mod import;
pub mod log;
pub mod start;
pub mod status;
pub mod stop;
pub mod util;
