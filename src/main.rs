//! Songbook - a music catalogue and player.
//!
//! Scans music folders into a SQLite catalogue, browses and searches it, and
//! plays it with a queue, shuffle and party mode. Everything is driven from
//! the command line; a desktop shell can drive the same [`app::App`].

pub mod app;
pub mod cli;
pub mod config;
pub mod control;
pub mod db;
pub mod error;
pub mod library;
pub mod metadata;
pub mod model;
pub mod player;
pub mod scanner;
pub mod search;
pub mod task;
#[cfg(test)]
pub mod test_utils;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log filter used when `RUST_LOG` is not set. Events are logged under
/// short targets, so each one is listed.
const DEFAULT_LOG_FILTER: &str = "songbook=info,config=info,control=info,db=info,library=info,player=info,search=info";

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .init();

    if cli::run_command(&args)? {
        return Ok(());
    }

    // No command specified
    cli::Cli::command().print_help()?;
    Ok(())
}
