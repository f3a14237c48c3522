//! Headless player driven from stdin.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedSender;

use super::{Cli, load_config, open_catalogue};
use crate::app::{App, AppEvent};
use crate::control::ControlCommand;

/// Play from the catalogue until `quit` or end of input
pub fn cmd_play(
    rt: &Runtime,
    cli: &Cli,
    shuffle: bool,
    party: bool,
    album: Option<i64>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let (config, config_path) = load_config(cli);
        let mut app = App::new(pool, config, config_path);
        app.override_modes(shuffle.then_some(true), party.then_some(true));

        let player = app.player_mut();
        let started = match album {
            Some(album_id) => player.play_album(album_id).await?,
            None => player.next().await?.is_some(),
        };
        if !started {
            println!("Nothing to play yet. Type a command, or `quit`.");
        }
        println!("Commands: play, pause, toggle, stop, next, prev, forward, back, seek SECONDS, quit");

        let events = app.sender();
        tokio::spawn(read_commands(BufReader::new(tokio::io::stdin()), events.clone()));
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = events.send(AppEvent::Quit);
            }
        });

        app.run().await?;
        Ok(())
    })
}

/// Forward each input line to the app as a control command.
///
/// `quit`, `q`, `exit` or the end of input stop the app.
async fn read_commands<R>(input: R, events: UnboundedSender<AppEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(target: "control", error = %e, "Reading commands failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "q" | "exit") {
            break;
        }
        match line.parse::<ControlCommand>() {
            Ok(command) => {
                if events.send(command.into()).is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
    let _ = events.send(AppEvent::Quit);
}
