use thiserror::Error;

/// Domain-level errors for MeetClock.
///
/// Display strings double as the status text shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Error: host bridge not available after {attempts} attempts. Are you running this inside the meeting app?")]
    HostUnavailable { attempts: u32 },

    #[error("Error initializing host bridge: {0}")]
    HostConfig(String),

    #[error("Host request failed: {0}")]
    HostRequest(String),

    #[error("Please enter a valid time")]
    InvalidDuration(String),

    #[error("Please enter a valid audio URL")]
    InvalidAudioSource,

    #[error("Audio URL is not reachable: {reason}")]
    UnreachableAudio { url: String, reason: String },

    #[error("Error loading audio URL: {0}")]
    AudioLoad(String),

    #[error("Error playing audio: {0}")]
    AudioPlayback(String),

    #[error("Error broadcasting timer: {0}")]
    BroadcastSend(String),

    #[error("Error applying video overlay: {0}")]
    OverlayApply(String),

    #[error("Error looking up participant identity: {0}")]
    HostIdentityLookup(String),

    #[error("Timer start cancelled")]
    StartSuperseded,

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_match_status_text() {
        assert_eq!(
            DomainError::InvalidDuration("0".to_string()).to_string(),
            "Please enter a valid time"
        );
        assert_eq!(
            DomainError::InvalidAudioSource.to_string(),
            "Please enter a valid audio URL"
        );
    }
}
