//! Desktop control surface: media keys and an MPRIS-like now-playing view.
//!
//! Media-key daemons deliver named signals (`"Play"`, `"Next"`, ...); a
//! desktop shell sends play/pause/seek requests and reads back what is
//! playing. Both map onto [`ControlCommand`], which [`apply`] runs against
//! the player.

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::db::{albums, tracks};
use crate::error::Result;
use crate::player::{PlaybackStatus, Player};

/// How far a relative seek jumps.
pub const SEEK_STEP: Duration = Duration::from_secs(10);

/// A key delivered by the media-key daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control '{0}'")]
pub struct UnknownControl(pub String);

impl FromStr for MediaKey {
    type Err = UnknownControl;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Play" => Ok(Self::Play),
            "Pause" => Ok(Self::Pause),
            "Stop" => Ok(Self::Stop),
            "Next" => Ok(Self::Next),
            "Previous" => Ok(Self::Previous),
            other => Err(UnknownControl(other.to_string())),
        }
    }
}

impl From<MediaKey> for ControlCommand {
    fn from(key: MediaKey) -> Self {
        match key {
            // Most keyboards have a single play/pause key that reports "Play"
            MediaKey::Play | MediaKey::Pause => Self::Toggle,
            MediaKey::Stop => Self::Stop,
            MediaKey::Next => Self::Next,
            MediaKey::Previous => Self::Previous,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// Commands the desktop can send to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    Next,
    Previous,
    /// Seek to absolute position
    Seek(Duration),
    /// Jump by [`SEEK_STEP`]
    SeekRelative(SeekDirection),
}

/// Text commands as typed on a terminal: `play`, `pause`, `toggle`, `stop`,
/// `next`, `prev`, `seek SECONDS`, `forward`, `back`.
impl FromStr for ControlCommand {
    type Err = UnknownControl;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        match (command.as_str(), words.next()) {
            ("play", None) => Ok(Self::Play),
            ("pause", None) => Ok(Self::Pause),
            ("toggle", None) | ("p", None) => Ok(Self::Toggle),
            ("stop", None) => Ok(Self::Stop),
            ("next", None) | ("n", None) => Ok(Self::Next),
            ("prev", None) | ("previous", None) => Ok(Self::Previous),
            ("forward", None) | ("ff", None) => Ok(Self::SeekRelative(SeekDirection::Forward)),
            ("back", None) | ("rew", None) => Ok(Self::SeekRelative(SeekDirection::Backward)),
            ("seek", Some(secs)) => secs
                .parse::<u64>()
                .map(|secs| Self::Seek(Duration::from_secs(secs)))
                .map_err(|_| UnknownControl(s.to_string())),
            _ => Err(UnknownControl(s.to_string())),
        }
    }
}

/// Run a control command against the player.
pub async fn apply(player: &mut Player, command: ControlCommand) -> Result<()> {
    tracing::debug!(target: "control", ?command, "Control command");
    match command {
        ControlCommand::Play => player.play()?,
        ControlCommand::Pause => player.pause()?,
        ControlCommand::Toggle => player.play_pause()?,
        ControlCommand::Stop => player.stop()?,
        ControlCommand::Next => {
            player.next().await?;
        }
        ControlCommand::Previous => {
            player.prev().await?;
        }
        ControlCommand::Seek(position) => {
            player.seek(position)?;
        }
        ControlCommand::SeekRelative(direction) => {
            let position = player.position();
            let target = match direction {
                SeekDirection::Forward => position + SEEK_STEP,
                SeekDirection::Backward => position.saturating_sub(SEEK_STEP),
            };
            player.seek(target)?;
        }
    }
    Ok(())
}

/// What the desktop shell shows for the current track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub track_id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Seconds
    pub length: u64,
    /// Seconds
    pub position: u64,
    pub status: PlaybackStatus,
}

impl NowPlaying {
    /// Snapshot of the player, or `None` with no track loaded.
    pub async fn snapshot(player: &Player, conn: &mut SqliteConnection) -> Result<Option<Self>> {
        let Some(track) = player.current() else {
            return Ok(None);
        };
        let artist = tracks::artist_name(&mut *conn, track.id)
            .await?
            .unwrap_or_else(|| crate::db::artists::UNKNOWN_ARTIST.to_string());
        let album = albums::display_name(&mut *conn, track.album_id).await?;

        Ok(Some(Self {
            track_id: track.id,
            title: track.name.clone(),
            artist,
            album,
            length: player.state().duration.as_secs(),
            position: player.position().as_secs(),
            status: player.status(),
        }))
    }
}
