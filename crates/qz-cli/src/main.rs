use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use qz_cli::commands::log::LogOptions;
use qz_cli::commands::{add, delete, import, log, start, status, stop};
use qz_cli::{Cli, Commands, Config};
use qz_core::TrackError;
use qz_db::Database;

/// Open the database, creating its directory and schema on first use.
fn open_database(path: &Path) -> Result<Database> {
    let existed = path.exists();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    if !existed {
        let shown = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        eprintln!("init db at {}", shown.display());
    }
    Ok(db)
}

/// Exit code for a failed invocation: the lifecycle error's own code, else 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<TrackError>())
        .map_or(1, TrackError::exit_code)
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if cli.locate {
        println!("{}", config.database_path.display());
        return Ok(());
    }

    let mut db = open_database(&config.database_path)?;
    let now = qz_core::time::now();
    let mut out = io::stdout().lock();

    match &cli.command {
        None => status::run(&mut out, &db, now)?,
        Some(Commands::Start { labels, at }) => {
            start::run(&mut out, &mut db, now, labels, at.as_deref())?;
        }
        Some(Commands::Stop {
            labels,
            at,
            discard,
        }) => {
            stop::run(&mut out, &mut db, now, labels, at.as_deref(), *discard)?;
        }
        Some(Commands::Add {
            labels,
            start,
            stop,
        }) => {
            add::run(&mut out, &mut db, now, labels, start, stop)?;
        }
        Some(Commands::Log { since, until, json }) => {
            let options = LogOptions {
                since: since.as_deref(),
                until: until.as_deref(),
                json: *json,
                days: config.log_days,
            };
            log::run(&mut out, &db, now, options)?;
        }
        Some(Commands::Delete { id }) => delete::run(&mut out, &mut db, now, id)?,
        Some(Commands::Import { tool, file }) => {
            import::run(&mut out, &mut db, now, *tool, file)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // stdout carries command output only
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("qz: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
