use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{DomainError, TimerRun};

/// Messages exchanged between participants through the host broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    TimerStart(TimerStartMessage),
}

/// Payload of a `timer_start` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStartMessage {
    pub start_time: i64,
    pub duration: u64,
    pub audio_url: String,
    pub starter_id: Option<String>,
}

impl PeerMessage {
    /// Decode a message received from the host.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        serde_json::from_value(value).map_err(|e| DomainError::MalformedMessage(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value, DomainError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl From<&TimerRun> for PeerMessage {
    fn from(run: &TimerRun) -> Self {
        PeerMessage::TimerStart(TimerStartMessage {
            start_time: run.start_timestamp,
            duration: run.duration_seconds,
            audio_url: run.audio_url.clone(),
            starter_id: run.starter_id.clone(),
        })
    }
}

impl TryFrom<TimerStartMessage> for TimerRun {
    type Error = DomainError;

    fn try_from(message: TimerStartMessage) -> Result<Self, Self::Error> {
        if message.duration == 0 {
            return Err(DomainError::MalformedMessage(
                "timer_start with zero duration".to_string(),
            ));
        }

        Ok(TimerRun {
            start_timestamp: message.start_time,
            duration_seconds: message.duration,
            audio_url: message.audio_url,
            starter_id: message.starter_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timer_start_wire_format() {
        let run = TimerRun {
            start_timestamp: 1_700_000_000_000,
            duration_seconds: 120,
            audio_url: "https://cdn.example.com/gong.mp3".to_string(),
            starter_id: None,
        };

        let value = PeerMessage::from(&run).to_value().unwrap();
        assert_eq!(
            value,
            json!({
                "type": "timer_start",
                "startTime": 1_700_000_000_000i64,
                "duration": 120,
                "audioUrl": "https://cdn.example.com/gong.mp3",
                "starterId": null,
            })
        );
    }

    #[test]
    fn test_decode_from_peer() {
        let message = PeerMessage::from_value(json!({
            "type": "timer_start",
            "startTime": 5000,
            "duration": 60,
            "audioUrl": "https://a/b.mp3",
            "starterId": "p-9",
        }))
        .unwrap();

        let PeerMessage::TimerStart(start) = message;
        let run = TimerRun::try_from(start).unwrap();
        assert_eq!(run.start_timestamp, 5000);
        assert_eq!(run.starter_id.as_deref(), Some("p-9"));
    }

    #[test]
    fn test_zero_duration_is_malformed() {
        let message = PeerMessage::from_value(json!({
            "type": "timer_start",
            "startTime": 5000,
            "duration": 0,
            "audioUrl": "https://a/b.mp3",
            "starterId": null,
        }))
        .unwrap();

        let PeerMessage::TimerStart(start) = message;
        assert!(matches!(
            TimerRun::try_from(start),
            Err(DomainError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let err = PeerMessage::from_value(json!({ "type": "chat", "text": "hi" }));
        assert!(matches!(err, Err(DomainError::MalformedMessage(_))));
    }
}
