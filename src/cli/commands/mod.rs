//! CLI command definitions and dispatch.
//!
//! Each group of subcommands lives in its own submodule:
//! - `library`: scanning and catalogue maintenance
//! - `browse`: listings, search and party picks
//! - `play`: the headless player

mod browse;
mod library;
mod play;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::db;

pub use browse::{cmd_albums, cmd_artists, cmd_genres, cmd_party, cmd_search, cmd_track, cmd_tracks};
pub use library::{cmd_clean, cmd_reset, cmd_scan};
pub use play::cmd_play;

/// Songbook CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalogue database file (default: the user data directory)
    #[arg(long, global = true, env = "SONGBOOK_DB")]
    pub db: Option<PathBuf>,

    /// Config file (default: the user config directory)
    #[arg(long, global = true, env = "SONGBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Scan music folders into the catalogue
    Scan {
        /// Folders to scan (default: the configured music paths)
        paths: Vec<PathBuf>,
    },
    /// Delete albums, artists and genres no track refers to
    Clean,
    /// Empty the catalogue
    Reset,
    /// List artists that own albums
    Artists {
        /// Only artists with albums in this genre
        #[arg(long)]
        genre: Option<i64>,
    },
    /// List genres
    Genres,
    /// List albums
    Albums {
        /// Albums of one artist
        #[arg(long, conflicts_with_all = ["compilations", "popular"])]
        artist: Option<i64>,
        /// Albums of one genre
        #[arg(long, conflicts_with = "popular")]
        genre: Option<i64>,
        /// Albums credited to several artists
        #[arg(long, conflicts_with = "popular")]
        compilations: bool,
        /// Most played albums
        #[arg(long)]
        popular: bool,
    },
    /// List the tracks of an album
    Tracks {
        album_id: i64,
    },
    /// Show one track
    Track {
        id: i64,
    },
    /// Search artists, albums and tracks
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Pick tracks the way party mode would
    Party {
        /// Genre to pick from (repeatable)
        #[arg(long = "genre")]
        genres: Vec<i64>,
        /// Pick from the most played albums
        #[arg(long)]
        popular: bool,
        /// How many tracks to pick
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Play headless, reading commands from stdin
    Play {
        /// Pick random tracks
        #[arg(long)]
        shuffle: bool,
        /// Pick from the configured party sources
        #[arg(long)]
        party: bool,
        /// Start with this album
        #[arg(long)]
        album: Option<i64>,
    },
    /// Print the effective configuration
    Config,
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &cli.command else {
        return Ok(false);
    };
    let rt = Runtime::new()?;

    match command {
        Commands::Scan { paths } => cmd_scan(&rt, cli, paths)?,
        Commands::Clean => cmd_clean(&rt, cli)?,
        Commands::Reset => cmd_reset(&rt, cli)?,
        Commands::Artists { genre } => cmd_artists(&rt, cli, *genre)?,
        Commands::Genres => cmd_genres(&rt, cli)?,
        Commands::Albums {
            artist,
            genre,
            compilations,
            popular,
        } => cmd_albums(&rt, cli, *artist, *genre, *compilations, *popular)?,
        Commands::Tracks { album_id } => cmd_tracks(&rt, cli, *album_id)?,
        Commands::Track { id } => cmd_track(&rt, cli, *id)?,
        Commands::Search { query } => cmd_search(&rt, cli, &query.join(" "))?,
        Commands::Party {
            genres,
            popular,
            count,
        } => cmd_party(&rt, cli, genres, *popular, *count)?,
        Commands::Play {
            shuffle,
            party,
            album,
        } => cmd_play(&rt, cli, *shuffle, *party, *album)?,
        Commands::Config => cmd_config(cli)?,
    }
    Ok(true)
}

/// Print the effective configuration
fn cmd_config(cli: &Cli) -> anyhow::Result<()> {
    let (config, path) = load_config(cli);
    if cli.json {
        return print_json(&config);
    }
    if let Some(path) = path {
        println!("# {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the catalogue named by `--db`, or the default one.
pub(crate) async fn open_catalogue(cli: &Cli) -> anyhow::Result<SqlitePool> {
    let path = cli.db.clone().unwrap_or_else(db::default_db_path);
    db::init_db(&path)
        .await
        .with_context(|| format!("cannot open catalogue {}", path.display()))
}

/// The config named by `--config`, or the standard one, with its path.
pub(crate) fn load_config(cli: &Cli) -> (Config, Option<PathBuf>) {
    match cli.config.clone().or_else(config::config_path) {
        Some(path) => (config::load_from(&path), Some(path)),
        None => (Config::default(), None),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
