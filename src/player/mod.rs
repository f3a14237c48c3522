//! The player: what is playing now and what plays next.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       Player (event loop)                     │
//! │  current track, queue, shuffle/party history, playback clock  │
//! └──────────────┬───────────────────────────────┬────────────────┘
//!                │ PlayerCommand                 │ PlayerEvent
//!                ▼                               ▼ crossbeam channel
//! ┌─────────────────────────────┐   ┌─────────────────────────────┐
//! │   AudioOutput collaborator  │   │  control surface, CLI, UI   │
//! └─────────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! Choosing the next track, in order of priority:
//!
//! 1. the play queue (first in, first out)
//! 2. party mode: a random track from the allowed albums
//! 3. shuffle: a random track from the whole catalogue
//! 4. the next track of the album, then the next album, wrapping around
//!
//! Random picks avoid tracks already heard until every candidate has been
//! played once.

mod output;
mod queue;
mod state;

pub use output::{AudioOutput, ChannelOutput, NullOutput};
pub use queue::{History, PlayQueue};
pub use state::{PlaybackStatus, PlayerCommand, PlayerEvent, PlayerState, format_duration};

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use rand::seq::IndexedRandom;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::{albums, tracks};
use crate::error::Result;
use crate::model::{PartySource, Track};

/// Player events kept for slow listeners before new ones are dropped.
const EVENT_BUFFER: usize = 64;

/// Plays tracks from the catalogue through an [`AudioOutput`].
pub struct Player {
    pool: SqlitePool,
    output: Box<dyn AudioOutput>,
    state: PlayerState,
    current: Option<Track>,
    queue: PlayQueue,
    history: History,
    shuffle: bool,
    party: bool,
    party_ids: Vec<PartySource>,
    /// Popularity already counted for the loaded track
    counted: bool,
    /// Albums with a completed play not yet written to the catalogue
    pending_plays: VecDeque<i64>,
    /// Play counts wait in `pending_plays` while set
    hold_writes: bool,
    event_tx: Sender<PlayerEvent>,
    event_rx: Receiver<PlayerEvent>,
}

impl Player {
    pub fn new(pool: SqlitePool, output: Box<dyn AudioOutput>) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_BUFFER);
        Self {
            pool,
            output,
            state: PlayerState::default(),
            current: None,
            queue: PlayQueue::new(),
            history: History::default(),
            shuffle: false,
            party: false,
            party_ids: Vec::new(),
            counted: false,
            pending_plays: VecDeque::new(),
            hold_writes: false,
            event_tx,
            event_rx,
        }
    }

    /// A player whose output discards audio.
    pub fn silent(pool: SqlitePool) -> Self {
        Self::new(pool, Box::new(NullOutput))
    }

    /// Receiver for player events. Clones share one stream.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.event_rx.clone()
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.status
    }

    /// The loaded track row.
    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn position(&self) -> Duration {
        self.state.position
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn is_party(&self) -> bool {
        self.party
    }

    pub fn party_ids(&self) -> &[PartySource] {
        &self.party_ids
    }

    /// Queued track ids in play order.
    pub fn queue(&self) -> Vec<i64> {
        self.queue.items()
    }

    fn emit(&self, event: PlayerEvent) {
        // Full buffer: nobody is keeping up, drop the event
        let _ = self.event_tx.try_send(event);
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        if self.state.status != status {
            self.state.status = status;
            self.emit(PlayerEvent::StatusChanged(status));
        }
    }

    /// Load a track and start playing it from the beginning.
    ///
    /// Returns `false` and changes nothing if the track does not exist.
    pub async fn load(&mut self, track_id: i64) -> Result<bool> {
        self.load_track(track_id, true).await
    }

    async fn load_track(&mut self, track_id: i64, record: bool) -> Result<bool> {
        let track = {
            let mut conn = self.pool.acquire().await?;
            tracks::get(&mut conn, track_id).await?
        };
        let Some(track) = track else {
            tracing::debug!(target: "player", track_id, "No such track");
            return Ok(false);
        };

        self.output
            .send(PlayerCommand::Load(PathBuf::from(&track.filepath)))?;
        self.output.send(PlayerCommand::Play)?;
        tracing::info!(target: "player", track_id, path = %track.filepath, "Now playing");

        if record && (self.shuffle || self.party) {
            self.history.record(track_id);
        }
        self.state.current = Some(track_id);
        self.state.position = Duration::ZERO;
        self.state.duration = Duration::from_secs(u64::try_from(track.length).unwrap_or(0));
        self.current = Some(track);
        self.counted = false;

        self.emit(PlayerEvent::CurrentChanged(Some(track_id)));
        self.set_status(PlaybackStatus::Playing);
        Ok(true)
    }

    /// Resume the loaded track. Does nothing without one.
    pub fn play(&mut self) -> Result<()> {
        if self.state.current.is_none() || self.state.status == PlaybackStatus::Playing {
            return Ok(());
        }
        self.output.send(PlayerCommand::Play)?;
        self.set_status(PlaybackStatus::Playing);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state.status != PlaybackStatus::Playing {
            return Ok(());
        }
        self.output.send(PlayerCommand::Pause)?;
        self.set_status(PlaybackStatus::Paused);
        Ok(())
    }

    pub fn play_pause(&mut self) -> Result<()> {
        match self.state.status {
            PlaybackStatus::Playing => self.pause(),
            PlaybackStatus::Paused | PlaybackStatus::Stopped => self.play(),
        }
    }

    /// Stop and rewind. The track stays loaded.
    pub fn stop(&mut self) -> Result<()> {
        if self.state.status != PlaybackStatus::Stopped {
            self.output.send(PlayerCommand::Stop)?;
        }
        self.state.position = Duration::ZERO;
        self.set_status(PlaybackStatus::Stopped);
        Ok(())
    }

    /// Move to the next track. Returns the track now playing, or `None`
    /// when there is nothing to play and the player stopped.
    pub async fn next(&mut self) -> Result<Option<i64>> {
        while let Some(track_id) = self.queue.pop_next() {
            if self.load(track_id).await? {
                return Ok(Some(track_id));
            }
        }

        let candidate = {
            let mut conn = self.pool.acquire().await?;
            if self.party {
                let pool = self.party_pool(&mut conn).await?;
                self.pick_random(&pool)
            } else if self.shuffle {
                let pool = tracks::all_ids(&mut conn).await?;
                self.pick_random(&pool)
            } else {
                self.sequential(&mut conn, true).await?
            }
        };

        match candidate {
            Some(track_id) if self.load(track_id).await? => Ok(Some(track_id)),
            _ => {
                tracing::debug!(target: "player", "Nothing left to play");
                self.stop()?;
                Ok(None)
            }
        }
    }

    /// Move to the previous track: back through the shuffle history in
    /// shuffle or party mode, else the previous track in album order.
    pub async fn prev(&mut self) -> Result<Option<i64>> {
        let candidate = if self.shuffle || self.party {
            self.history.back()
        } else {
            let mut conn = self.pool.acquire().await?;
            self.sequential(&mut conn, false).await?
        };

        match candidate {
            Some(track_id) if self.load_track(track_id, false).await? => Ok(Some(track_id)),
            _ => Ok(None),
        }
    }

    /// Track ids party mode may choose from.
    async fn party_pool(&self, conn: &mut SqliteConnection) -> Result<Vec<i64>> {
        let album_ids = albums::party_ids(&mut *conn, &self.party_ids).await?;
        tracks::ids_for_albums(conn, &album_ids).await
    }

    fn pick_random(&mut self, pool: &[i64]) -> Option<i64> {
        let current = self.state.current;
        let others: Vec<i64> = pool
            .iter()
            .copied()
            .filter(|id| Some(*id) != current)
            .collect();
        if others.is_empty() {
            // Only the current track qualifies, or nothing does
            return pool.first().copied();
        }

        let mut fresh: Vec<i64> = others
            .iter()
            .copied()
            .filter(|id| !self.history.has_played(*id))
            .collect();
        if fresh.is_empty() {
            tracing::debug!(target: "player", candidates = others.len(), "Every candidate played, starting over");
            self.history.start_round(current);
            fresh = others;
        }
        fresh.choose(&mut rand::rng()).copied()
    }

    /// Neighbouring track in album order, wrapping around the catalogue.
    async fn sequential(&self, conn: &mut SqliteConnection, forward: bool) -> Result<Option<i64>> {
        let order = albums::browse_order(&mut *conn).await?;
        if order.is_empty() {
            return Ok(None);
        }

        let Some(current) = &self.current else {
            for album_id in &order {
                if let Some(&first) = albums::track_ids(&mut *conn, *album_id).await?.first() {
                    return Ok(Some(first));
                }
            }
            return Ok(None);
        };

        let album_tracks = albums::track_ids(&mut *conn, current.album_id).await?;
        if let Some(index) = album_tracks.iter().position(|id| *id == current.id) {
            let neighbour = if forward {
                album_tracks.get(index + 1)
            } else {
                index.checked_sub(1).and_then(|i| album_tracks.get(i))
            };
            if let Some(&track_id) = neighbour {
                return Ok(Some(track_id));
            }
        }

        let len = order.len();
        let start = order
            .iter()
            .position(|id| *id == current.album_id)
            .unwrap_or(0);
        for step in 1..=len {
            let index = if forward {
                (start + step) % len
            } else {
                (start + len - step % len) % len
            };
            let ids = albums::track_ids(&mut *conn, order[index]).await?;
            let pick = if forward { ids.first() } else { ids.last() };
            if let Some(&track_id) = pick {
                return Ok(Some(track_id));
            }
        }
        Ok(None)
    }

    pub fn append_to_queue(&mut self, track_id: i64) {
        self.queue.add(track_id);
    }

    pub fn prepend_to_queue(&mut self, track_id: i64) {
        self.queue.add_next(track_id);
    }

    pub fn remove_from_queue(&mut self, track_id: i64) -> bool {
        self.queue.remove(track_id)
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn move_up(&mut self, index: usize) -> Option<usize> {
        self.queue.move_up(index)
    }

    pub fn move_down(&mut self, index: usize) -> Option<usize> {
        self.queue.move_down(index)
    }

    /// Play an album from its first track.
    pub async fn play_album(&mut self, album_id: i64) -> Result<bool> {
        let first = {
            let mut conn = self.pool.acquire().await?;
            albums::track_ids(&mut conn, album_id).await?.first().copied()
        };
        match first {
            Some(track_id) => self.load(track_id).await,
            None => Ok(false),
        }
    }

    /// Jump within the loaded track. The position is clamped to the track
    /// length when it is known; the clamped value is returned.
    pub fn seek(&mut self, position: Duration) -> Result<Duration> {
        if self.state.current.is_none() {
            return Ok(Duration::ZERO);
        }
        let target = if self.state.length_known() {
            position.min(self.state.duration)
        } else {
            position
        };
        self.output.send(PlayerCommand::Seek(target))?;
        self.state.position = target;
        self.emit(PlayerEvent::Seeked(target));
        Ok(target)
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        if self.shuffle == enabled {
            return;
        }
        tracing::info!(target: "player", enabled, "Shuffle");
        self.shuffle = enabled;
        self.restart_history();
    }

    pub fn set_party(&mut self, enabled: bool) {
        if self.party == enabled {
            return;
        }
        tracing::info!(target: "player", enabled, sources = self.party_ids.len(), "Party mode");
        self.party = enabled;
        self.restart_history();
    }

    /// Replace the sources party mode picks from.
    pub fn set_party_ids(&mut self, ids: Vec<PartySource>) {
        self.party_ids = ids;
        self.history.start_round(self.state.current);
    }

    fn restart_history(&mut self) {
        self.history.clear();
        if let Some(current) = self.state.current
            && (self.shuffle || self.party)
        {
            self.history.record(current);
        }
    }

    /// Advance the playback clock while playing.
    ///
    /// When the track reaches its end it completes (see
    /// [`track_finished`](Self::track_finished)); the id of the track that
    /// started in its place is returned. A track of unknown length never
    /// completes from the clock; the output reports its end instead.
    pub async fn tick(&mut self, elapsed: Duration) -> Result<Option<i64>> {
        if self.state.status != PlaybackStatus::Playing || self.state.current.is_none() {
            return Ok(None);
        }
        self.state.position += elapsed;
        if !self.state.length_known() {
            return Ok(None);
        }
        self.state.position = self.state.position.min(self.state.duration);
        if self.state.at_end() {
            return self.track_finished().await;
        }
        Ok(None)
    }

    /// The loaded track played to the end: count one play for its album
    /// (once per load) and move on.
    ///
    /// The count is queued first and written by [`flush_plays`](Self::flush_plays),
    /// so a busy catalogue delays it without losing it.
    pub async fn track_finished(&mut self) -> Result<Option<i64>> {
        let album_id = self.current.as_ref().map(|t| t.album_id);
        if let Some(album_id) = album_id
            && !self.counted
        {
            self.counted = true;
            self.pending_plays.push_back(album_id);
        }
        self.flush_plays().await;
        self.next().await
    }

    /// Keep play counts queued instead of writing them, e.g. while a scan
    /// holds the catalogue's write lock.
    pub fn hold_writes(&mut self, hold: bool) {
        self.hold_writes = hold;
    }

    /// Completed plays not yet written to the catalogue.
    pub fn pending_plays(&self) -> usize {
        self.pending_plays.len()
    }

    /// Write queued play counts, oldest first. Stops at the first failure
    /// and keeps the rest for the next attempt. Returns how many remain.
    pub async fn flush_plays(&mut self) -> usize {
        if self.hold_writes {
            return self.pending_plays.len();
        }
        while let Some(&album_id) = self.pending_plays.front() {
            match self.count_play(album_id).await {
                Ok(popularity) => {
                    tracing::debug!(target: "player", album_id, ?popularity, "Counted play");
                    self.pending_plays.pop_front();
                }
                Err(e) => {
                    tracing::warn!(
                        target: "player",
                        album_id,
                        pending = self.pending_plays.len(),
                        error = %e,
                        "Play count deferred"
                    );
                    break;
                }
            }
        }
        self.pending_plays.len()
    }

    async fn count_play(&self, album_id: i64) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        albums::increment_popularity(&mut conn, album_id).await
    }
}
