use serde::Serialize;

/// Events emitted by the audio player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PlaybackEvent {
    /// Playback of a track started.
    Started { url: String },
    /// A track played to its end.
    Ended { url: String },
    /// Playback failed after it was requested.
    Error { url: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PlaybackEvent::Ended {
            url: "file:///tmp/gong.wav".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Ended");
        assert_eq!(json["data"]["url"], "file:///tmp/gong.wav");
    }
}
