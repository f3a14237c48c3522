//! Application core: owns the catalogue pool, scanner, player and searcher,
//! and runs the event loop that ties them together.
//!
//! Workers never touch front-end state. They post [`AppEvent`]s to the loop,
//! which is the only place the player and the latest search results change.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::config::{self, Config};
use crate::control::{self, ControlCommand, NowPlaying};
use crate::error::Result;
use crate::library::{ScanEvent, ScanReport, ScanState, Scanner};
use crate::player::Player;
use crate::search::{SearchItem, SearchResults, Searcher};
use crate::task::CancellationToken;

/// How often the playback clock advances.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Everything the event loop reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Scan(ScanEvent),
    Search(SearchResults),
    Control(ControlCommand),
    /// Wall-clock time since the previous tick
    Tick(Duration),
    /// The audio output played the loaded track to its end
    TrackEnded,
    Quit,
}

impl From<ScanEvent> for AppEvent {
    fn from(event: ScanEvent) -> Self {
        Self::Scan(event)
    }
}

impl From<SearchResults> for AppEvent {
    fn from(results: SearchResults) -> Self {
        Self::Search(results)
    }
}

impl From<ControlCommand> for AppEvent {
    fn from(command: ControlCommand) -> Self {
        Self::Control(command)
    }
}

pub struct App {
    pool: SqlitePool,
    config: Config,
    /// Where settings are written back on quit, `None` to never save
    config_path: Option<PathBuf>,
    scanner: Scanner,
    player: Player,
    searcher: Searcher,
    /// Parent of every background task; cancelled on shutdown
    workers: CancellationToken,
    results: Vec<SearchItem>,
    last_scan: Option<ScanReport>,
    /// Shuffle and party values set for this run only
    shuffle_override: Option<bool>,
    party_override: Option<bool>,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
}

impl App {
    /// Build the app around an open catalogue. Playback modes come from the
    /// config.
    pub fn new(pool: SqlitePool, config: Config, config_path: Option<PathBuf>) -> Self {
        Self::with_player(Player::silent(pool.clone()), pool, config, config_path)
    }

    /// Same as [`new`](Self::new) with a caller-supplied player.
    pub fn with_player(
        mut player: Player,
        pool: SqlitePool,
        config: Config,
        config_path: Option<PathBuf>,
    ) -> Self {
        player.set_party_ids(config.player.party_ids.clone());
        player.set_shuffle(config.player.shuffle);
        player.set_party(config.player.party);

        let (events_tx, events_rx) = unbounded_channel();
        let workers = CancellationToken::new();
        Self {
            scanner: Scanner::with_parent(pool.clone(), workers.clone()),
            searcher: Searcher::with_parent(pool.clone(), workers.clone()),
            workers,
            pool,
            config,
            config_path,
            player,
            results: Vec::new(),
            last_scan: None,
            shuffle_override: None,
            party_override: None,
            events_tx,
            events_rx,
        }
    }

    /// Turn shuffle or party mode on or off for this run without changing
    /// the saved settings. Switching the mode again later is saved as usual.
    pub fn override_modes(&mut self, shuffle: Option<bool>, party: Option<bool>) {
        if let Some(enabled) = shuffle {
            self.player.set_shuffle(enabled);
        }
        if let Some(enabled) = party {
            self.player.set_party(enabled);
        }
        self.shuffle_override = shuffle;
        self.party_override = party;
    }

    /// A handle for posting events into the loop.
    pub fn sender(&self) -> UnboundedSender<AppEvent> {
        self.events_tx.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Hits of the latest accepted search.
    pub fn search_results(&self) -> &[SearchItem] {
        &self.results
    }

    /// Report of the most recent finished scan.
    pub fn last_scan(&self) -> Option<&ScanReport> {
        self.last_scan.as_ref()
    }

    /// Scan the configured music folders. Returns `false` if a scan is
    /// already running or no folder is configured.
    pub fn start_scan(&self) -> bool {
        let roots = self.config.library.music_paths.clone();
        if roots.is_empty() {
            tracing::warn!(target: "library::scan", "No music folders configured");
            return false;
        }
        self.scanner.start(roots, self.events_tx.clone()).is_some()
    }

    /// Submit a search; results arrive as [`AppEvent::Search`].
    pub fn search(&self, query: &str) -> u64 {
        self.searcher.submit(query, self.events_tx.clone())
    }

    /// What is playing, for a desktop shell.
    pub async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        let mut conn = self.pool.acquire().await?;
        NowPlaying::snapshot(&self.player, &mut conn).await
    }

    /// React to one event. Breaks on [`AppEvent::Quit`].
    ///
    /// Failures are logged; the loop keeps running.
    pub async fn handle(&mut self, event: AppEvent) -> ControlFlow<()> {
        match event {
            AppEvent::Scan(event) => self.on_scan(event).await,
            AppEvent::Search(results) => {
                if self.searcher.accept(results.generation) {
                    self.results = results.items;
                } else {
                    tracing::trace!(target: "search", generation = results.generation, "Stale results");
                }
            }
            AppEvent::Control(command) => {
                if let Err(e) = control::apply(&mut self.player, command).await {
                    tracing::warn!(target: "player", ?command, error = %e, "Control command failed");
                }
            }
            AppEvent::Tick(elapsed) => {
                // A scan holds the write lock until it commits
                self.player.hold_writes(self.scanner.is_scanning());
                if let Err(e) = self.player.tick(elapsed).await {
                    tracing::warn!(target: "player", error = %e, "Playback clock failed");
                }
            }
            AppEvent::TrackEnded => {
                self.player.hold_writes(self.scanner.is_scanning());
                if let Err(e) = self.player.track_finished().await {
                    tracing::warn!(target: "player", error = %e, "Moving past finished track failed");
                }
            }
            AppEvent::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_scan(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Started { total } => {
                tracing::info!(target: "library::scan", total, "Scanning");
            }
            ScanEvent::Progress { .. } => {}
            ScanEvent::Skipped { path, reason } => {
                tracing::debug!(target: "library::scan", path = %path.display(), %reason, "Skipped");
            }
            ScanEvent::Finished(_) | ScanEvent::Failed(_) => {
                match self.scanner.acknowledge() {
                    ScanState::Finished(report) => self.last_scan = Some(report),
                    ScanState::Failed(reason) => {
                        tracing::warn!(target: "library::scan", %reason, "Scan failed");
                    }
                    ScanState::Idle | ScanState::Scanning { .. } => {}
                }
                self.player.hold_writes(false);
                self.player.flush_plays().await;
            }
        }
    }

    /// Run the event loop until [`AppEvent::Quit`] arrives, then save
    /// settings.
    ///
    /// Starts a library scan first when the config asks for one.
    pub async fn run(&mut self) -> Result<()> {
        if self.config.library.startup_scan {
            self.start_scan();
        }

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_tick = tokio::time::Instant::now();

        loop {
            let event = tokio::select! {
                now = ticker.tick() => {
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;
                    AppEvent::Tick(elapsed)
                }
                event = self.events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if self.handle(event).await.is_break() {
                break;
            }
        }

        self.shutdown().await
    }

    /// Stop background work, write pending play counts and save playback
    /// modes back to the config. Modes overridden for this run keep their
    /// saved values.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.searcher.cancel();
        self.workers.cancel();
        if let Err(e) = self.player.stop() {
            tracing::debug!(target: "player", error = %e, "Stop on shutdown failed");
        }
        self.player.hold_writes(false);
        let unsaved = self.player.flush_plays().await;
        if unsaved > 0 {
            tracing::warn!(target: "player", unsaved, "Play counts lost on shutdown");
        }

        let shuffle = self.player.is_shuffle();
        if self.shuffle_override != Some(shuffle) {
            self.config.player.shuffle = shuffle;
        }
        let party = self.player.is_party();
        if self.party_override != Some(party) {
            self.config.player.party = party;
        }
        self.config.player.party_ids = self.player.party_ids().to_vec();

        match &self.config_path {
            Some(path) => {
                config::save_async(self.config.clone(), path.clone()).await?;
            }
            None => tracing::debug!(target: "config", "No config path, settings not saved"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{albums, artists, genres};
    use crate::model::{ArtistKey, PartySource};
    use crate::player::PlaybackStatus;
    use crate::search::SearchKind;
    use crate::test_utils::{add_track, temp_db, write_song};

    async fn one_track(pool: &SqlitePool) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        let artist = artists::add(&mut conn, "Low").await.unwrap();
        let genre = genres::add(&mut conn, "Slowcore").await.unwrap();
        let album = albums::add(&mut conn, "Trust", ArtistKey::Artist(artist), genre, 2002, "/low")
            .await
            .unwrap();
        add_track(&mut conn, "/low/Canada.mp3", 1, artist, album).await
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.library.startup_scan = false;
        config.library.music_paths.clear();
        config
    }

    #[tokio::test]
    async fn test_config_modes_reach_the_player() {
        let (pool, _dir) = temp_db().await;
        let mut config = quiet_config();
        config.player.shuffle = true;
        config.player.party = true;
        config.player.party_ids = vec![PartySource::Popular];

        let app = App::new(pool, config, None);
        assert!(app.player().is_shuffle());
        assert!(app.player().is_party());
        assert_eq!(app.player().party_ids(), &[PartySource::Popular]);
    }

    #[tokio::test]
    async fn test_quit_saves_playback_modes() {
        let (pool, dir) = temp_db().await;
        let path = dir.path().join("config.toml");
        let mut app = App::new(pool, quiet_config(), Some(path.clone()));

        app.player_mut().set_party_ids(vec![PartySource::Genre(3)]);
        app.player_mut().set_party(true);
        app.sender().send(AppEvent::Quit).unwrap();
        app.run().await.unwrap();

        let saved = config::load_from(&path);
        assert!(saved.player.party);
        assert!(!saved.player.shuffle);
        assert_eq!(saved.player.party_ids, vec![PartySource::Genre(3)]);
    }

    #[tokio::test]
    async fn test_run_overrides_are_not_saved() {
        let (pool, dir) = temp_db().await;
        let path = dir.path().join("config.toml");
        let mut app = App::new(pool, quiet_config(), Some(path.clone()));

        app.override_modes(Some(true), Some(true));
        assert!(app.player().is_shuffle());
        assert!(app.player().is_party());

        // Party switched off again during the run: that choice is kept
        app.player_mut().set_party(false);
        app.sender().send(AppEvent::Quit).unwrap();
        app.run().await.unwrap();

        let saved = config::load_from(&path);
        assert!(!saved.player.shuffle);
        assert!(!saved.player.party);
    }

    #[tokio::test]
    async fn test_play_finished_during_scan_is_counted() {
        let (pool, dir) = temp_db().await;
        let music = dir.path().join("music");
        write_song(&music.join("a/01.wav"), "One", "Band", "First", "Rock", 1);

        let mut config = quiet_config();
        config.library.music_paths = vec![music];
        let mut app = App::new(pool.clone(), config, None);
        assert!(app.start_scan());
        while app.last_scan().is_none() {
            let event = app.events_rx.recv().await.unwrap();
            app.handle(event).await;
        }
        let (track, album) = {
            let mut conn = pool.acquire().await.unwrap();
            let track = crate::db::tracks::all_ids(&mut conn).await.unwrap()[0];
            let album = crate::db::tracks::album_id(&mut conn, track).await.unwrap().unwrap();
            (track, album)
        };

        // The track ends while a second scan is writing
        app.player_mut().load(track).await.unwrap();
        app.last_scan = None;
        assert!(app.start_scan());
        app.handle(AppEvent::Tick(Duration::from_secs(3600))).await;
        while app.last_scan().is_none() {
            let event = app.events_rx.recv().await.unwrap();
            app.handle(event).await;
        }

        assert_eq!(app.player().pending_plays(), 0);
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(albums::get(&mut conn, album).await.unwrap().unwrap().popularity, 1);
    }

    #[tokio::test]
    async fn test_track_end_from_the_output_moves_on() {
        let (pool, _dir) = temp_db().await;
        let track = one_track(&pool).await;
        let mut app = App::new(pool, quiet_config(), None);
        app.player_mut().load(track).await.unwrap();

        app.handle(AppEvent::TrackEnded).await;
        // Wraps around to the only track
        assert_eq!(app.player().state().current, Some(track));
        assert_eq!(app.player().position(), Duration::ZERO);

        let mut conn = app.pool.acquire().await.unwrap();
        let album = crate::db::tracks::album_id(&mut conn, track).await.unwrap().unwrap();
        assert_eq!(albums::get(&mut conn, album).await.unwrap().unwrap().popularity, 1);
    }

    #[tokio::test]
    async fn test_control_and_tick_drive_the_player() {
        let (pool, _dir) = temp_db().await;
        let track = one_track(&pool).await;
        let mut app = App::new(pool, quiet_config(), None);
        app.player_mut().load(track).await.unwrap();

        assert!(app.handle(AppEvent::Tick(Duration::from_secs(5))).await.is_continue());
        assert_eq!(app.player().position(), Duration::from_secs(5));

        app.handle(ControlCommand::Toggle.into()).await;
        assert_eq!(app.player().status(), PlaybackStatus::Paused);

        // Paused: the clock stands still
        app.handle(AppEvent::Tick(Duration::from_secs(5))).await;
        assert_eq!(app.player().position(), Duration::from_secs(5));

        let now = app.now_playing().await.unwrap().unwrap();
        assert_eq!(now.title, "Canada");
        assert_eq!(now.status, PlaybackStatus::Paused);

        assert!(app.handle(AppEvent::Quit).await.is_break());
    }

    #[tokio::test]
    async fn test_only_latest_search_is_kept() {
        let (pool, _dir) = temp_db().await;
        one_track(&pool).await;
        let mut app = App::new(pool, quiet_config(), None);

        let generation = app.search("trust");
        let event = app.events_rx.recv().await.unwrap();
        assert!(matches!(&event, AppEvent::Search(results) if results.generation == generation));
        app.handle(event).await;
        assert_eq!(app.search_results().len(), 1);
        assert_eq!(app.search_results()[0].kind, SearchKind::Album);

        let stale = AppEvent::Search(SearchResults {
            generation: generation - 1,
            items: Vec::new(),
        });
        app.handle(stale).await;
        assert_eq!(app.search_results().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_outcome_is_acknowledged() {
        let (pool, dir) = temp_db().await;
        let music = dir.path().join("music");
        write_song(&music.join("a/01.wav"), "One", "Band", "First", "Rock", 1);
        write_song(&music.join("a/02.wav"), "Two", "Band", "First", "Rock", 2);

        let mut config = quiet_config();
        config.library.music_paths = vec![music];
        let mut app = App::new(pool, config, None);
        assert!(app.start_scan());

        while app.last_scan().is_none() {
            let event = app.events_rx.recv().await.unwrap();
            app.handle(event).await;
        }
        assert_eq!(app.last_scan().unwrap().imported, 2);
        assert_eq!(app.scanner().state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_scan_needs_a_folder() {
        let (pool, _dir) = temp_db().await;
        let app = App::new(pool, quiet_config(), None);
        assert!(!app.start_scan());
    }
}
