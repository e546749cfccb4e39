use tracing::debug;

use crate::app::TimerController;
use crate::domain::{format_time, RunState, TimerForm, TimerPhase};

pub const HELP: &str = "\
Commands:
  start [seconds] [audio-url]  start a countdown (defaults to the current form)
  preset <n>                   fill the duration from preset n (1-based)
  stop                         stop the current countdown
  status                       show the timer state
  help                         show this help
  quit                         stop and exit";

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        duration: Option<String>,
        audio_url: Option<String>,
    },
    Preset(usize),
    Stop,
    Status,
    Help,
    Quit,
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print this text.
    Text(String),
    /// Nothing to print; the view already reported the outcome.
    Silent,
    Quit,
}

/// Parse a command line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("start", []) => Command::Start {
            duration: None,
            audio_url: None,
        },
        ("start", [duration]) => Command::Start {
            duration: Some(duration.to_string()),
            audio_url: None,
        },
        ("start", [duration, audio_url]) => Command::Start {
            duration: Some(duration.to_string()),
            audio_url: Some(audio_url.to_string()),
        },
        ("preset", [n]) => {
            let index = n
                .parse::<usize>()
                .ok()
                .filter(|&i| i > 0)
                .ok_or_else(|| format!("Invalid preset number: {}", n))?;
            Command::Preset(index)
        }
        ("stop", []) => Command::Stop,
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("start" | "preset" | "stop" | "status" | "help" | "quit", _) => {
            return Err(format!("Wrong arguments for '{}'. Type 'help'.", name));
        }
        _ => return Err(format!("Unknown command '{}'. Type 'help'.", name)),
    };

    Ok(Some(command))
}

/// Seconds of preset `n` (1-based).
pub fn preset_seconds(presets: &[u64], n: usize) -> Result<u64, String> {
    n.checked_sub(1)
        .and_then(|i| presets.get(i))
        .copied()
        .ok_or_else(|| format!("No preset {} (have {})", n, presets.len()))
}

/// One-line summary of the timer.
pub fn status_line(phase: TimerPhase, state: RunState, host_ready: bool) -> String {
    let host = if host_ready {
        "host connected"
    } else {
        "host unavailable"
    };

    match phase {
        TimerPhase::Running if state.is_starter => format!(
            "Running {} (started here), {}",
            format_time(state.remaining_seconds),
            host
        ),
        TimerPhase::Running => format!(
            "Running {}, {}",
            format_time(state.remaining_seconds),
            host
        ),
        TimerPhase::Validating => format!("Validating input, {}", host),
        TimerPhase::Finished => format!("Finished, {}", host),
        TimerPhase::Idle => format!(
            "Idle at {}, {}",
            format_time(state.remaining_seconds),
            host
        ),
    }
}

/// Run a parsed command against the timer.
///
/// `form` holds the duration and audio URL fields between commands.
pub async fn execute(
    timer: &TimerController,
    presets: &[u64],
    form: &mut TimerForm,
    command: Command,
) -> Reply {
    debug!(?command, "Executing command");

    match command {
        Command::Start {
            duration,
            audio_url,
        } => {
            if let Some(duration) = duration {
                form.duration = duration;
            }
            if let Some(audio_url) = audio_url {
                form.audio_url = audio_url;
            }
            // Failures are already reported on the view.
            let _ = timer.start(form).await;
            Reply::Silent
        }
        Command::Preset(n) => match preset_seconds(presets, n) {
            Ok(seconds) => {
                timer.apply_preset(form, seconds);
                Reply::Silent
            }
            Err(e) => Reply::Text(e),
        },
        Command::Stop => {
            timer.stop().await;
            Reply::Silent
        }
        Command::Status => Reply::Text(status_line(
            timer.phase(),
            timer.run_state(),
            timer.host_ready(),
        )),
        Command::Help => Reply::Text(HELP.to_string()),
        Command::Quit => Reply::Quit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_variants() {
        assert_eq!(
            parse_command("start").unwrap(),
            Some(Command::Start {
                duration: None,
                audio_url: None
            })
        );
        assert_eq!(
            parse_command("  START 90  https://x.test/gong.mp3 ").unwrap(),
            Some(Command::Start {
                duration: Some("90".to_string()),
                audio_url: Some("https://x.test/gong.mp3".to_string()),
            })
        );
        // Duration is validated by the timer, not the parser.
        assert_eq!(
            parse_command("start abc").unwrap(),
            Some(Command::Start {
                duration: Some("abc".to_string()),
                audio_url: None
            })
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("stop").unwrap(), Some(Command::Stop));
        assert_eq!(parse_command("status").unwrap(), Some(Command::Status));
        assert_eq!(parse_command("?").unwrap(), Some(Command::Help));
        assert_eq!(parse_command("exit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("preset 2").unwrap(), Some(Command::Preset(2)));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("preset 0").is_err());
        assert!(parse_command("preset two").is_err());
        assert!(parse_command("stop now").unwrap_err().contains("Wrong arguments"));
        assert!(parse_command("snooze").unwrap_err().contains("Unknown command"));
        assert!(parse_command("start 1 2 3").is_err());
    }

    #[test]
    fn test_preset_seconds() {
        let presets = [60, 120];
        assert_eq!(preset_seconds(&presets, 1), Ok(60));
        assert_eq!(preset_seconds(&presets, 2), Ok(120));
        assert!(preset_seconds(&presets, 3).is_err());
        assert!(preset_seconds(&presets, 0).is_err());
    }

    #[test]
    fn test_status_line() {
        let running = RunState {
            remaining_seconds: 42,
            is_active: true,
            is_starter: true,
        };
        assert_eq!(
            status_line(TimerPhase::Running, running, true),
            "Running 00:42 (started here), host connected"
        );

        let idle = RunState {
            remaining_seconds: 7,
            is_active: false,
            is_starter: false,
        };
        assert_eq!(
            status_line(TimerPhase::Idle, idle, false),
            "Idle at 00:07, host unavailable"
        );
    }
}
