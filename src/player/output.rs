//! Audio output collaborators.
//!
//! The player never decodes audio itself. It sends [`PlayerCommand`]s to
//! whatever implements [`AudioOutput`] and keeps its own playback clock, so
//! a real engine, a test recorder and a silent stand-in are interchangeable.

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::state::PlayerCommand;
use crate::error::{Error, Result};

/// Something that plays audio files on command.
pub trait AudioOutput: Send {
    fn send(&mut self, command: PlayerCommand) -> Result<()>;
}

/// Discards every command. Playback still advances through the player's
/// clock, which is enough for headless use.
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn send(&mut self, command: PlayerCommand) -> Result<()> {
        tracing::trace!(target: "player", ?command, "Silent output");
        Ok(())
    }
}

/// Forwards commands over a channel to an audio thread.
#[derive(Debug)]
pub struct ChannelOutput {
    command_tx: Sender<PlayerCommand>,
}

impl ChannelOutput {
    /// Create an output and the receiving end for the audio thread.
    pub fn new() -> (Self, Receiver<PlayerCommand>) {
        let (command_tx, command_rx) = unbounded();
        (Self { command_tx }, command_rx)
    }
}

impl AudioOutput for ChannelOutput {
    fn send(&mut self, command: PlayerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| Error::playback(format!("audio channel unavailable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_channel_output_forwards() {
        let (mut output, rx) = ChannelOutput::new();
        output.send(PlayerCommand::Load(PathBuf::from("a.mp3"))).unwrap();
        output.send(PlayerCommand::Play).unwrap();

        assert_eq!(rx.try_recv().unwrap(), PlayerCommand::Load(PathBuf::from("a.mp3")));
        assert_eq!(rx.try_recv().unwrap(), PlayerCommand::Play);
    }

    #[test]
    fn test_closed_channel_is_a_playback_error() {
        let (mut output, rx) = ChannelOutput::new();
        drop(rx);
        let err = output.send(PlayerCommand::Stop).unwrap_err();
        assert!(matches!(err, Error::Playback(_)));
    }
}
