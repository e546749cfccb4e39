use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Host capabilities the widget may declare at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    NotifyAppEvent,
    PostMessage,
    OnMessage,
    SetVideoFilter,
    GetUserContext,
}

impl Capability {
    /// Wire name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::NotifyAppEvent => "notifyAppEvent",
            Capability::PostMessage => "postMessage",
            Capability::OnMessage => "onMessage",
            Capability::SetVideoFilter => "setVideoFilter",
            Capability::GetUserContext => "getUserContext",
        }
    }
}

/// Identity of the local participant as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub participant_id: Option<String>,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Event reported to the host through `notifyAppEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEvent {
    pub event: String,
    pub data: Value,
}

impl AppEvent {
    /// Event emitted once a countdown reaches zero.
    pub fn timer_finished() -> Self {
        Self {
            event: "timer_finished".to_string(),
            data: json!({ "message": "Timer reached zero and audio played" }),
        }
    }
}
