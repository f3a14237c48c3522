//! Playback state plus the messages exchanged with the output and listeners.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Current playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Snapshot of what the player is doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub status: PlaybackStatus,
    /// Loaded track id (if any)
    pub current: Option<i64>,
    /// Position in the loaded track
    pub position: Duration,
    /// Length of the loaded track, zero when unknown
    pub duration: Duration,
}

impl PlayerState {
    /// Whether the loaded track's length is known.
    pub fn length_known(&self) -> bool {
        !self.duration.is_zero()
    }

    /// A loaded track of known length has played up to its length.
    pub fn at_end(&self) -> bool {
        self.current.is_some() && self.length_known() && self.position >= self.duration
    }
}

/// `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_duration(length: Duration) -> String {
    let total = length.as_secs();
    match (total / 3600, total % 3600 / 60, total % 60) {
        (0, minutes, seconds) => format!("{minutes}:{seconds:02}"),
        (hours, minutes, seconds) => format!("{hours}:{minutes:02}:{seconds:02}"),
    }
}

/// What the player asks of its audio output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Open a file, replacing whatever was loaded
    Load(PathBuf),
    Play,
    Pause,
    Stop,
    /// Jump to an absolute position in the loaded file
    Seek(Duration),
}

/// Notifications for anything mirroring the player (control surface, CLI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    CurrentChanged(Option<i64>),
    StatusChanged(PlaybackStatus),
    Seeked(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0:00");
        assert_eq!(format_duration(Duration::from_secs(245)), "4:05");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(2 * 3600 + 7)), "2:00:07");
    }

    #[test]
    fn test_at_end_needs_a_track() {
        let mut state = PlayerState::default();
        assert!(!state.at_end());

        state.current = Some(1);
        state.duration = Duration::from_secs(10);
        state.position = Duration::from_secs(9);
        assert!(!state.at_end());
        state.position = Duration::from_secs(10);
        assert!(state.at_end());
    }

    #[test]
    fn test_unknown_length_never_ends() {
        let state = PlayerState {
            current: Some(1),
            position: Duration::from_secs(30),
            ..Default::default()
        };
        assert!(!state.length_known());
        assert!(!state.at_end());
    }
}
