use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::host::Capability;

/// Delay growth between readiness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles after every retry.
    Exponential,
}

/// Host bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// WebSocket URL of the host relay.
    pub relay_url: String,
    /// Retries after the first failed readiness probe.
    pub ready_retries: u32,
    /// Base delay between readiness probes in milliseconds.
    pub ready_delay_ms: u64,
    /// Delay growth between probes.
    pub backoff: Backoff,
    /// Timeout for a single host request in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:9741".to_string(),
            ready_retries: 5,
            ready_delay_ms: 1000,
            backoff: Backoff::Fixed,
            request_timeout_ms: 5000,
        }
    }
}

impl HostConfig {
    /// Retry policy for host readiness polling.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.ready_retries,
            delay: Duration::from_millis(self.ready_delay_ms),
            backoff: self.backoff,
        }
    }
}

/// Bounded retry policy for host readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Total number of probes, the first attempt included.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay to wait after the failed probe with the given zero-based index.
    pub fn delay_after(&self, probe: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self.delay.saturating_mul(1u32 << probe.min(16)),
        }
    }
}

/// Timer input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// Preset durations in seconds.
    pub presets: Vec<u64>,
    /// Audio URL used when a start command omits one.
    pub default_audio_url: String,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            presets: vec![60, 120],
            default_audio_url: String::new(),
        }
    }
}

/// Optional capabilities of the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Broadcast timer starts to other participants.
    pub broadcast: bool,
    /// Overlay the countdown onto the starter's outgoing video.
    pub video_overlay: bool,
    /// Probe the audio URL before starting.
    pub probe_audio: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            broadcast: true,
            video_overlay: true,
            probe_audio: true,
        }
    }
}

impl FeatureFlags {
    /// Capabilities to declare to the host for these features.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities = vec![Capability::NotifyAppEvent];
        if self.broadcast {
            capabilities.extend([
                Capability::PostMessage,
                Capability::OnMessage,
                Capability::GetUserContext,
            ]);
        }
        if self.video_overlay {
            capabilities.push(Capability::SetVideoFilter);
        }
        capabilities
    }
}

/// Overlay surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub width: u32,
    pub height: u32,
    /// Height of the banner painted across the top.
    pub banner_height: u32,
    pub font_size: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            banner_height: 80,
            font_size: 48.0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub host: HostConfig,
    pub timer: TimerSettings,
    pub features: FeatureFlags,
    pub overlay: OverlayConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let policy = HostConfig::default().retry_policy();
        assert_eq!(policy.attempts(), 6);
        assert_eq!(policy.delay_after(0), Duration::from_secs(1));
        assert_eq!(policy.delay_after(4), Duration::from_secs(1));
    }

    #[test]
    fn test_attempts_saturate_on_huge_retry_count() {
        let policy = RetryPolicy {
            retries: u32::MAX,
            delay: Duration::from_millis(1),
            backoff: Backoff::Fixed,
        };
        assert_eq!(policy.attempts(), u32::MAX);
    }

    #[test]
    fn test_exponential_backoff_doubles() {
        let policy = RetryPolicy {
            retries: 10,
            delay: Duration::from_millis(2000),
            backoff: Backoff::Exponential,
        };
        assert_eq!(policy.delay_after(0), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(4000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(16000));
    }

    #[test]
    fn test_capabilities_follow_features() {
        let minimal = FeatureFlags {
            broadcast: false,
            video_overlay: false,
            probe_audio: false,
        };
        assert_eq!(minimal.capabilities(), vec![Capability::NotifyAppEvent]);

        let full = FeatureFlags::default().capabilities();
        assert!(full.contains(&Capability::PostMessage));
        assert!(full.contains(&Capability::OnMessage));
        assert!(full.contains(&Capability::GetUserContext));
        assert!(full.contains(&Capability::SetVideoFilter));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [features]
            video_overlay = false

            [host]
            ready_retries = 10
            ready_delay_ms = 2000
            backoff = "exponential"
            "#,
        )
        .unwrap();

        assert!(config.features.broadcast);
        assert!(!config.features.video_overlay);
        assert_eq!(config.host.ready_retries, 10);
        assert_eq!(config.host.backoff, Backoff::Exponential);
        assert_eq!(config.timer.presets, vec![60, 120]);
    }
}
