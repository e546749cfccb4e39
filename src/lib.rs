#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod commands;
pub mod domain;
pub mod infrastructure;
pub mod ports;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, info};

pub use app::{AppController, AppOptions};
use commands::{execute, parse_command, Reply};
use domain::{PlaybackEvent, TimerForm};

/// Run the interactive widget until `quit`, end of input or Ctrl-C.
pub async fn run(options: AppOptions) -> anyhow::Result<()> {
    let controller = AppController::new(options)?;
    let config = controller.config();

    info!(config_path = %controller.config_path(), logs_dir = %controller.logs_dir(), "Paths");

    let playback = tokio::spawn(report_playback(controller.playback_events()));

    controller.connect().await;
    println!("{}", commands::HELP);

    let mut form = TimerForm::new(String::new(), config.timer.default_audio_url.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match execute(controller.timer(), &config.timer.presets, &mut form, command).await {
            Reply::Text(text) => println!("{}", text),
            Reply::Silent => {}
            Reply::Quit => break,
        }
    }

    controller.shutdown().await;
    playback.abort();
    Ok(())
}

async fn report_playback(mut events: broadcast::Receiver<PlaybackEvent>) {
    loop {
        match events.recv().await {
            Ok(PlaybackEvent::Started { url }) => debug!(%url, "Audio started"),
            Ok(PlaybackEvent::Ended { url }) => {
                info!(%url, "Audio finished");
                println!("[audio]  finished");
            }
            Ok(PlaybackEvent::Error { url, message }) => {
                debug!(%url, %message, "Audio error event");
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
