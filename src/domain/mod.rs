pub mod audio;
pub mod config;
pub mod error;
pub mod host;
pub mod message;
pub mod timer;

pub use audio::PlaybackEvent;
pub use config::{AppConfig, FeatureFlags, OverlayConfig, RetryPolicy};
pub use error::DomainError;
pub use host::{AppEvent, Capability, UserContext};
pub use message::{PeerMessage, TimerStartMessage};
pub use timer::{format_time, RunState, TimerConfig, TimerForm, TimerPhase, TimerRun};
