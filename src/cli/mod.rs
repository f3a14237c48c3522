//! Command-line interface for songbook.
//!
//! Browses the catalogue, runs scans and maintenance, and drives a headless
//! player from stdin.

mod commands;

pub use commands::{Cli, Commands, run_command};
