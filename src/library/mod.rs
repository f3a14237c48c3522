//! Library scan: walks the music folders and brings the catalogue in line.
//!
//! A [`Scanner`] runs at most one scan at a time. The whole scan, including
//! the removal of vanished files, compilation merge and orphan cleanup, runs
//! inside one transaction that commits at the end. A failed or cancelled scan
//! rolls back and leaves the catalogue as it was.
//!
//! ```text
//! Idle ──start──▶ Scanning ──▶ Finished(report) ──acknowledge──▶ Idle
//!                    │
//!                    └───────▶ Failed(reason) ────acknowledge──▶ Idle
//! ```
//!
//! Progress and outcomes are posted as [`ScanEvent`]s over an unbounded
//! channel; the receiver decides what to render.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::mpsc::UnboundedSender;

use crate::db::maintenance::{self, CleanReport};
use crate::db::{albums, artists, genres, tracks};
use crate::error::{Result, ResultExt};
use crate::metadata::{self, TrackTags};
use crate::model::{ArtistKey, NewTrack};
use crate::scanner;
use crate::task::{CancelCheck, CancellationToken, Task};

/// Where the scanner is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning { done: usize, total: usize },
    Finished(ScanReport),
    Failed(String),
}

/// Progress and outcome notifications from a running scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Started { total: usize },
    Progress { done: usize, total: usize },
    /// A file was left out of the catalogue
    Skipped { path: PathBuf, reason: String },
    Finished(ScanReport),
    Failed(String),
}

/// Summary of a completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ScanReport {
    /// New or changed files written to the catalogue
    pub imported: usize,
    /// Files whose modification time matched the catalogue
    pub unchanged: usize,
    pub skipped: usize,
    /// Catalogue tracks whose file is gone
    pub removed: usize,
    /// Album rows folded into compilations
    pub merged: u64,
    pub cleaned: CleanReport,
    pub started_at: String,
    pub finished_at: String,
}

/// Runs library scans against one catalogue.
#[derive(Debug, Clone)]
pub struct Scanner {
    pool: SqlitePool,
    state: Arc<Mutex<ScanState>>,
    token: Arc<Mutex<Option<CancellationToken>>>,
    /// Cancelling this stops any scan started from here
    parent: CancellationToken,
}

impl Scanner {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_parent(pool, CancellationToken::new())
    }

    /// A scanner whose scans also stop when `parent` is cancelled.
    pub fn with_parent(pool: SqlitePool, parent: CancellationToken) -> Self {
        Self {
            pool,
            state: Arc::new(Mutex::new(ScanState::Idle)),
            token: Arc::new(Mutex::new(None)),
            parent,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state.lock().clone()
    }

    pub fn is_scanning(&self) -> bool {
        matches!(*self.state.lock(), ScanState::Scanning { .. })
    }

    /// Start scanning `roots`.
    ///
    /// Returns `None` without doing anything while a scan is already
    /// running; the caller keeps receiving the running scan's events.
    pub fn start<E>(&self, roots: Vec<PathBuf>, events: UnboundedSender<E>) -> Option<Task<Result<ScanReport>>>
    where
        E: From<ScanEvent> + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if matches!(*state, ScanState::Scanning { .. }) {
                tracing::debug!(target: "library::scan", "Scan already running");
                return None;
            }
            *state = ScanState::Scanning { done: 0, total: 0 };
        }

        let pool = self.pool.clone();
        let state = Arc::clone(&self.state);
        let task = Task::spawn_under(&self.parent, move |token| async move {
            let sink = Sink { events, state };
            run(pool, roots, token, sink).await
        });
        *self.token.lock() = Some(task.token().clone());
        Some(task)
    }

    /// Ask the running scan, if any, to stop before its next file.
    pub fn cancel(&self) {
        if let Some(token) = self.token.lock().as_ref() {
            token.cancel();
        }
    }

    /// Return a finished or failed scanner to idle, handing back the outcome.
    ///
    /// Leaves a running scan alone.
    pub fn acknowledge(&self) -> ScanState {
        let mut state = self.state.lock();
        if matches!(*state, ScanState::Scanning { .. }) {
            return state.clone();
        }
        *self.token.lock() = None;
        std::mem::take(&mut *state)
    }
}

/// Where a scan reports to.
struct Sink<E> {
    events: UnboundedSender<E>,
    state: Arc<Mutex<ScanState>>,
}

impl<E: From<ScanEvent>> Sink<E> {
    fn emit(&self, event: ScanEvent) {
        // A closed receiver only means nobody is watching
        let _ = self.events.send(E::from(event));
    }

    fn progress(&self, done: usize, total: usize) {
        *self.state.lock() = ScanState::Scanning { done, total };
        self.emit(ScanEvent::Progress { done, total });
    }
}

async fn run<E: From<ScanEvent>>(
    pool: SqlitePool,
    roots: Vec<PathBuf>,
    token: CancellationToken,
    sink: Sink<E>,
) -> Result<ScanReport> {
    let started_at = Utc::now().to_rfc3339();
    tracing::info!(target: "library::scan", roots = roots.len(), "Scan started");

    let outcome = scan_into(&pool, roots, &token, &sink, started_at).await;
    match &outcome {
        Ok(report) => {
            tracing::info!(
                target: "library::scan",
                imported = report.imported,
                unchanged = report.unchanged,
                skipped = report.skipped,
                removed = report.removed,
                merged = report.merged,
                "Scan finished"
            );
            *sink.state.lock() = ScanState::Finished(report.clone());
            sink.emit(ScanEvent::Finished(report.clone()));
        }
        Err(e) => {
            if e.is_cancelled() {
                tracing::info!(target: "library::scan", "Scan cancelled, changes rolled back");
            } else {
                tracing::error!(target: "library::scan", error = %e, "Scan failed, changes rolled back");
            }
            *sink.state.lock() = ScanState::Failed(e.to_string());
            sink.emit(ScanEvent::Failed(e.to_string()));
        }
    }
    outcome
}

async fn scan_into<E: From<ScanEvent>>(
    pool: &SqlitePool,
    roots: Vec<PathBuf>,
    token: &CancellationToken,
    sink: &Sink<E>,
    started_at: String,
) -> Result<ScanReport> {
    let files: Vec<PathBuf> = scanner::scan(roots).collect().await;
    let total = files.len();
    sink.emit(ScanEvent::Started { total });
    sink.progress(0, total);

    // Dropping the transaction on any early return rolls it back
    let mut tx = pool.begin().await.with_context("starting scan transaction")?;
    let known: HashMap<String, i64> = tracks::known_files(&mut tx)
        .await
        .with_context("loading known files")?
        .into_iter()
        .collect();

    let mut report = ScanReport {
        started_at,
        ..Default::default()
    };

    for (index, path) in files.iter().enumerate() {
        token.check()?;

        let key = path.display().to_string();
        let mtime = scanner::mtime(path).unwrap_or(0);
        if known.get(&key) == Some(&mtime) {
            report.unchanged += 1;
        } else {
            let file = path.clone();
            match tokio::task::spawn_blocking(move || metadata::read(&file)).await? {
                Ok(tags) => {
                    import(&mut tx, path, &key, mtime, &tags).await?;
                    report.imported += 1;
                }
                Err(e) => {
                    tracing::warn!(target: "library::scan", path = %path.display(), error = %e, "Skipping file");
                    report.skipped += 1;
                    sink.emit(ScanEvent::Skipped {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        sink.progress(index + 1, total);
    }

    token.check()?;

    let known_paths: Vec<String> = known.into_keys().collect();
    let gone = tokio::task::spawn_blocking(move || scanner::missing(known_paths)).await?;
    for path in &gone {
        if tracks::remove_by_path(&mut tx, path).await? {
            tracing::debug!(target: "library::scan", path = %path, "Removed missing file");
            report.removed += 1;
        }
    }

    report.merged = maintenance::merge_compilations(&mut tx).await?;
    report.cleaned = maintenance::clean_orphans(&mut tx).await?;

    tx.commit().await?;
    report.finished_at = Utc::now().to_rfc3339();
    Ok(report)
}

/// Resolve or create the rows one file needs and upsert its track.
async fn import(
    conn: &mut SqliteConnection,
    path: &Path,
    key: &str,
    mtime: i64,
    tags: &TrackTags,
) -> Result<i64> {
    let artist_id = artists::get_or_create(&mut *conn, &tags.artist).await?;
    let credit_id = if tags.album_credit() == tags.artist {
        artist_id
    } else {
        artists::get_or_create(&mut *conn, tags.album_credit()).await?
    };
    let genre_id = genres::get_or_create(&mut *conn, &tags.genre).await?;

    let folder = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let credit = ArtistKey::Artist(credit_id);

    let album_id = match albums::find(&mut *conn, &tags.album, credit, genre_id).await? {
        Some(id) => id,
        None => match albums::find_compilation(&mut *conn, &tags.album, &folder).await? {
            Some(id) => id,
            None => {
                let year = tags.year.map(i64::from).unwrap_or(0);
                albums::add(&mut *conn, &tags.album, credit, genre_id, year, &folder).await?
            }
        },
    };

    let track = NewTrack {
        name: tags.title.clone(),
        filepath: key.to_string(),
        length: i64::try_from(tags.duration).unwrap_or(i64::MAX),
        track_number: tags.track_number.map(i64::from).unwrap_or(0),
        artist_id,
        album_id,
        mtime,
    };
    tracks::upsert(conn, &track).await
}
