//! Free-text search over the catalogue.
//!
//! Each [`Searcher::submit`] supersedes the previous query: the in-flight
//! worker is cancelled and a generation counter moves on, so results that
//! arrive late are recognised by [`Searcher::accept`] and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::mpsc::UnboundedSender;

use crate::db::{albums, artists, tracks};
use crate::error::Result;
use crate::model::{AlbumScope, ArtistKey};
use crate::task::{CancelCheck, CancellationToken, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Album,
    Track,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchItem {
    pub kind: SearchKind,
    pub id: i64,
    pub title: String,
    pub artist: String,
    /// Track count, albums only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

/// Results of one submitted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub generation: u64,
    pub items: Vec<SearchItem>,
}

/// Runs searches on worker tasks, one live query at a time.
#[derive(Debug)]
pub struct Searcher {
    pool: SqlitePool,
    generation: Arc<AtomicU64>,
    current: Mutex<Option<Task<()>>>,
    parent: CancellationToken,
}

impl Searcher {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_parent(pool, CancellationToken::new())
    }

    /// A searcher whose workers also stop when `parent` is cancelled.
    pub fn with_parent(pool: SqlitePool, parent: CancellationToken) -> Self {
        Self {
            pool,
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
            parent,
        }
    }

    /// Start a search for `query`, cancelling the previous one.
    ///
    /// Results are posted to `events` tagged with the returned generation.
    /// An empty query posts an empty result straight away.
    pub fn submit<E>(&self, query: &str, events: UnboundedSender<E>) -> u64
    where
        E: From<SearchResults> + Send + 'static,
    {
        if let Some(previous) = self.current.lock().take() {
            previous.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let text = query.trim().to_string();
        if text.is_empty() {
            let _ = events.send(E::from(SearchResults {
                generation,
                items: Vec::new(),
            }));
            return generation;
        }

        let pool = self.pool.clone();
        let latest = Arc::clone(&self.generation);
        let task = Task::spawn_under(&self.parent, move |token| async move {
            let items = match pool.acquire().await {
                Ok(mut conn) => find(&mut conn, &text, &token).await,
                Err(e) => Err(e.into()),
            };
            if token.is_cancelled() || latest.load(Ordering::SeqCst) != generation {
                tracing::debug!(target: "search", generation, "Dropping superseded search");
                return;
            }
            match items {
                Ok(items) => {
                    tracing::debug!(target: "search", generation, hits = items.len(), "Search finished");
                    let _ = events.send(E::from(SearchResults { generation, items }));
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!(target: "search", error = %e, "Search failed"),
            }
        });
        *self.current.lock() = Some(task);
        generation
    }

    /// Whether results tagged `generation` belong to the latest query.
    pub fn accept(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Cancel the in-flight search without starting another.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.current.lock().take() {
            previous.cancel();
        }
    }
}

/// Run one query to completion on a single connection.
///
/// Albums come first: albums of matching artists, then albums whose name
/// matches. Tracks follow: tracks whose name matches, then tracks matching
/// artists perform on albums credited to someone else.
pub async fn find(
    conn: &mut SqliteConnection,
    text: &str,
    token: &CancellationToken,
) -> Result<Vec<SearchItem>> {
    let artist_ids = artists::search(&mut *conn, text).await?;

    let mut album_hits: Vec<(i64, ArtistKey)> = Vec::new();
    for artist_id in &artist_ids {
        token.check()?;
        for album_id in albums::ids(&mut *conn, AlbumScope::Artist(*artist_id)).await? {
            album_hits.push((album_id, ArtistKey::Artist(*artist_id)));
        }
    }
    for hit in albums::search(&mut *conn, text).await? {
        if !album_hits.iter().any(|(id, _)| *id == hit.0) {
            album_hits.push(hit);
        }
    }

    let mut items = Vec::with_capacity(album_hits.len());
    for (album_id, artist) in album_hits {
        token.check()?;
        items.push(SearchItem {
            kind: SearchKind::Album,
            id: album_id,
            title: albums::display_name(&mut *conn, album_id).await?,
            artist: artists::display_name(&mut *conn, artist).await?,
            count: Some(albums::track_count(&mut *conn, album_id).await?),
        });
    }

    let mut track_hits = tracks::search(&mut *conn, text).await?;
    for artist_id in &artist_ids {
        token.check()?;
        for hit in tracks::guest_appearances(&mut *conn, *artist_id).await? {
            if !track_hits.iter().any(|(id, _)| *id == hit.0) {
                track_hits.push(hit);
            }
        }
    }

    for (track_id, title) in track_hits {
        token.check()?;
        let artist = tracks::artist_name(&mut *conn, track_id)
            .await?
            .unwrap_or_else(|| artists::UNKNOWN_ARTIST.to_string());
        items.push(SearchItem {
            kind: SearchKind::Track,
            id: track_id,
            title,
            artist,
            count: None,
        });
    }

    Ok(items)
}
