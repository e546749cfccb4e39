use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Timer controller state machine.
///
/// State transitions:
/// - Idle -> Validating (user start)
/// - Validating -> Running (inputs valid) or back to the previous phase
/// - Running -> Finished (remaining reaches zero)
/// - Running -> Idle (stop, or a new run replacing this one)
/// - Idle/Finished -> Running (peer timer start)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerPhase {
    Idle,
    Validating,
    Running,
    Finished,
}

impl TimerPhase {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, TimerPhase::Running)
    }
}

/// Raw user input from the duration and audio fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerForm {
    pub duration: String,
    pub audio_url: String,
}

impl TimerForm {
    pub fn new(duration: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            duration: duration.into(),
            audio_url: audio_url.into(),
        }
    }
}

/// Validated parameters of one timer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub duration_seconds: u64,
    pub audio_url: String,
}

impl TimerConfig {
    /// Validate user input.
    pub fn from_form(form: &TimerForm) -> Result<Self, DomainError> {
        let raw = form.duration.trim();
        let duration_seconds = match raw.parse::<i64>() {
            Ok(seconds) if seconds > 0 => seconds as u64,
            _ => return Err(DomainError::InvalidDuration(raw.to_string())),
        };

        let audio_url = form.audio_url.trim();
        if audio_url.is_empty() {
            return Err(DomainError::InvalidAudioSource);
        }

        Ok(Self {
            duration_seconds,
            audio_url: audio_url.to_string(),
        })
    }
}

/// One countdown run as shared with peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerRun {
    /// Sender's wall clock at start, epoch milliseconds.
    pub start_timestamp: i64,
    pub duration_seconds: u64,
    pub audio_url: String,
    pub starter_id: Option<String>,
}

impl TimerRun {
    pub fn new(config: TimerConfig, start_timestamp: i64, starter_id: Option<String>) -> Self {
        Self {
            start_timestamp,
            duration_seconds: config.duration_seconds,
            audio_url: config.audio_url,
            starter_id,
        }
    }

    /// Seconds left at `now` as seen by the local wall clock.
    ///
    /// Negative or zero once the run is over. Clock skew between the
    /// sender and the local participant is not compensated. Saturates on
    /// out-of-range timestamps and durations.
    pub fn remaining_at(&self, now: i64) -> i64 {
        let elapsed = now.saturating_sub(self.start_timestamp).div_euclid(1000);
        let duration = i64::try_from(self.duration_seconds).unwrap_or(i64::MAX);
        duration.saturating_sub(elapsed)
    }

    /// Whether the given participant started this run.
    pub fn started_by(&self, participant_id: Option<&str>) -> bool {
        match (self.starter_id.as_deref(), participant_id) {
            (Some(starter), Some(local)) => starter == local,
            _ => false,
        }
    }
}

/// Snapshot of the single live run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub remaining_seconds: u64,
    pub is_active: bool,
    pub is_starter: bool,
}

/// Format seconds as zero-padded "MM:SS".
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(3599), "59:59");
        assert_eq!(format_time(6000), "100:00");
    }

    #[test]
    fn test_form_validation() {
        let config = TimerConfig::from_form(&TimerForm::new(" 90 ", "https://a/b.mp3")).unwrap();
        assert_eq!(config.duration_seconds, 90);
        assert_eq!(config.audio_url, "https://a/b.mp3");

        for duration in ["", "0", "-5", "abc", "1.5"] {
            let err = TimerConfig::from_form(&TimerForm::new(duration, "https://a/b.mp3"));
            assert!(matches!(err, Err(DomainError::InvalidDuration(_))), "{duration}");
        }

        let err = TimerConfig::from_form(&TimerForm::new("60", "  "));
        assert_eq!(err, Err(DomainError::InvalidAudioSource));
    }

    #[test]
    fn test_remaining_from_peer_start() {
        let start = 1_700_000_000_000;
        let run = TimerRun {
            start_timestamp: start,
            duration_seconds: 60,
            audio_url: "https://a/b.mp3".to_string(),
            starter_id: None,
        };

        assert_eq!(run.remaining_at(start + 10_000), 50);
        assert_eq!(run.remaining_at(start + 10_999), 50);
        assert!(run.remaining_at(start + 61_000) <= 0);
        // A receiver clock behind the sender yields more than the duration.
        assert_eq!(run.remaining_at(start - 500), 61);
    }

    #[test]
    fn test_remaining_with_extreme_peer_values() {
        let now = 1_700_000_000_000;
        let mut run = TimerRun {
            start_timestamp: i64::MIN,
            duration_seconds: 60,
            audio_url: "https://a/b.mp3".to_string(),
            starter_id: None,
        };
        assert!(run.remaining_at(now) <= 0);

        run.start_timestamp = i64::MAX;
        assert!(run.remaining_at(now) > 60);

        run.start_timestamp = now;
        run.duration_seconds = u64::MAX;
        assert_eq!(run.remaining_at(now + 10_000), i64::MAX - 10);
    }

    #[test]
    fn test_started_by() {
        let run = TimerRun {
            start_timestamp: 0,
            duration_seconds: 1,
            audio_url: "x".to_string(),
            starter_id: Some("p-1".to_string()),
        };
        assert!(run.started_by(Some("p-1")));
        assert!(!run.started_by(Some("p-2")));
        assert!(!run.started_by(None));
    }

    #[test]
    fn test_phase_helpers() {
        assert!(TimerPhase::Running.is_running());
        assert!(!TimerPhase::Finished.is_running());
        assert!(!TimerPhase::Validating.is_running());
    }
}
