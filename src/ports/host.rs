use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::{AppEvent, Capability, DomainError, UserContext};
use crate::ports::OverlayStream;

/// Port for the embedding host application.
///
/// Covers capability configuration, host actions and the peer broadcast
/// channel. Delivery of broadcast messages is asynchronous and unordered.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Check whether the host capability object is reachable.
    async fn probe(&self) -> bool;

    /// Declare the capabilities the widget needs.
    async fn configure(&self, capabilities: &[Capability]) -> Result<(), DomainError>;

    /// Report an app event to the host.
    async fn notify_app_event(&self, event: &AppEvent) -> Result<(), DomainError>;

    /// Send a message to every other participant.
    async fn post_message(&self, message: Value) -> Result<(), DomainError>;

    /// Replace the outgoing video with `stream`, or remove the filter with `None`.
    async fn set_video_filter(&self, stream: Option<OverlayStream>) -> Result<(), DomainError>;

    /// Look up the local participant.
    async fn user_context(&self) -> Result<UserContext, DomainError>;

    /// Subscribe to messages broadcast by other participants.
    fn subscribe(&self) -> broadcast::Receiver<Value>;
}
