use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{AppEvent, Capability, DomainError, UserContext};
use crate::ports::{HostBridge, OverlayFrame, OverlayStream};

type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, String>>>>>;

/// Request envelope sent to the relay.
#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    id: String,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    message: String,
}

/// Text frames received from the relay.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelayInbound {
    Response {
        id: String,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<RelayErrorBody>,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

/// Encode an overlay frame as a binary relay frame.
///
/// Layout: width (u32 BE), height (u32 BE), RGBA pixels.
pub fn encode_frame(frame: &OverlayFrame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + frame.pixels.len());
    bytes.extend_from_slice(&frame.width.to_be_bytes());
    bytes.extend_from_slice(&frame.height.to_be_bytes());
    bytes.extend_from_slice(&frame.pixels);
    bytes
}

/// A live relay connection.
struct Connection {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingReplies,
    closed: CancellationToken,
}

/// Host bridge talking to the meeting host through a WebSocket relay.
pub struct RelayHostBridge {
    url: String,
    request_timeout: Duration,
    connection: tokio::sync::Mutex<Option<Arc<Connection>>>,
    messages: broadcast::Sender<Value>,
    video_filter: Mutex<Option<CancellationToken>>,
}

impl RelayHostBridge {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        let (messages, _) = broadcast::channel(64);
        Self {
            url: url.into(),
            request_timeout,
            connection: tokio::sync::Mutex::new(None),
            messages,
            video_filter: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>, DomainError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            if !conn.closed.is_cancelled() {
                return Ok(Arc::clone(conn));
            }
            debug!("Relay connection closed, reconnecting");
        }

        let conn = Arc::new(self.connect().await?);
        *guard = Some(Arc::clone(&conn));
        Ok(conn)
    }

    async fn connect(&self) -> Result<Connection, DomainError> {
        let connecting = connect_async(self.url.as_str());
        let (ws_stream, _) = tokio::time::timeout(self.request_timeout, connecting)
            .await
            .map_err(|_| {
                DomainError::HostRequest(format!("Timed out connecting to {}", self.url))
            })?
            .map_err(|e| DomainError::HostRequest(e.to_string()))?;

        info!(url = %self.url, "Connected to host relay");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let closed = CancellationToken::new();

        let writer_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_closed.cancelled() => break,
                    message = rx.recv() => {
                        let Some(message) = message else { break };
                        if let Err(e) = ws_sender.send(message).await {
                            error!(error = %e, "Failed to send to host relay");
                            break;
                        }
                    }
                }
            }
            writer_closed.cancel();
            let _ = ws_sender.close().await;
        });

        let reader_pending = Arc::clone(&pending);
        let reader_closed = closed.clone();
        let messages = self.messages.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = reader_closed.cancelled() => break,
                    next = ws_receiver.next() => next,
                };

                match next {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_inbound(&text, &reader_pending, &messages);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Host relay closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Host relay read failed");
                        break;
                    }
                }
            }
            reader_closed.cancel();
            // Dropping the senders fails every outstanding request.
            reader_pending.lock().clear();
        });

        Ok(Connection {
            outgoing: tx,
            pending,
            closed,
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, DomainError> {
        let conn = self.connection().await?;
        let id = Uuid::new_v4().to_string();
        let (reply, response) = oneshot::channel();
        conn.pending.lock().insert(id.clone(), reply);

        let text = serde_json::to_string(&RelayRequest {
            id: id.clone(),
            method,
            params,
        })?;

        if conn.outgoing.send(Message::Text(text)).is_err() {
            conn.pending.lock().remove(&id);
            return Err(DomainError::HostRequest("Host relay connection closed".to_string()));
        }

        debug!(method = method, id = %id, "Host request sent");

        match tokio::time::timeout(self.request_timeout, response).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(DomainError::HostRequest(message)),
            Ok(Err(_)) => Err(DomainError::HostRequest(
                "Host relay connection closed".to_string(),
            )),
            Err(_) => {
                conn.pending.lock().remove(&id);
                Err(DomainError::HostRequest(format!("{} timed out", method)))
            }
        }
    }

    fn replace_frame_forwarder(&self, forwarder: Option<CancellationToken>) {
        let previous = std::mem::replace(&mut *self.video_filter.lock(), forwarder);
        if let Some(token) = previous {
            token.cancel();
        }
    }
}

fn dispatch_inbound(text: &str, pending: &PendingReplies, messages: &broadcast::Sender<Value>) {
    match serde_json::from_str::<RelayInbound>(text) {
        Ok(RelayInbound::Response { id, result, error }) => {
            let Some(reply) = pending.lock().remove(&id) else {
                debug!(id = %id, "Response for unknown request");
                return;
            };
            let outcome = match error {
                Some(body) => Err(body.message),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            let _ = reply.send(outcome);
        }
        Ok(RelayInbound::Event { event, payload }) => {
            if event == "onMessage" {
                // No receivers simply means nobody is listening yet.
                let _ = messages.send(payload);
            } else {
                debug!(event = %event, "Ignoring host event");
            }
        }
        Err(e) => warn!(error = %e, "Unrecognized relay frame"),
    }
}

async fn forward_frames(
    mut stream: OverlayStream,
    outgoing: mpsc::UnboundedSender<Message>,
    cancelled: CancellationToken,
) {
    loop {
        let frame = stream.borrow_and_update().clone();
        if outgoing.send(Message::Binary(encode_frame(&frame))).is_err() {
            break;
        }

        tokio::select! {
            _ = cancelled.cancelled() => break,
            changed = stream.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Overlay frame forwarding stopped");
}

#[async_trait]
impl HostBridge for RelayHostBridge {
    async fn probe(&self) -> bool {
        match self.connection().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Host relay probe failed");
                false
            }
        }
    }

    async fn configure(&self, capabilities: &[Capability]) -> Result<(), DomainError> {
        let names: Vec<&str> = capabilities.iter().map(Capability::as_str).collect();
        self.request("config", json!({ "capabilities": names }))
            .await
            .map_err(|e| DomainError::HostConfig(e.to_string()))?;
        info!(capabilities = ?names, "Host capabilities configured");
        Ok(())
    }

    async fn notify_app_event(&self, event: &AppEvent) -> Result<(), DomainError> {
        self.request("notifyAppEvent", serde_json::to_value(event)?)
            .await
            .map(|_| ())
    }

    async fn post_message(&self, message: Value) -> Result<(), DomainError> {
        self.request("postMessage", message)
            .await
            .map(|_| ())
            .map_err(|e| DomainError::BroadcastSend(e.to_string()))
    }

    async fn set_video_filter(&self, stream: Option<OverlayStream>) -> Result<(), DomainError> {
        let Some(stream) = stream else {
            self.replace_frame_forwarder(None);
            self.request("setVideoFilter", json!({ "enabled": false }))
                .await
                .map_err(|e| DomainError::OverlayApply(e.to_string()))?;
            return Ok(());
        };

        let (width, height) = {
            let frame = stream.borrow();
            (frame.width, frame.height)
        };
        self.request(
            "setVideoFilter",
            json!({ "enabled": true, "width": width, "height": height }),
        )
        .await
        .map_err(|e| DomainError::OverlayApply(e.to_string()))?;

        let conn = self
            .connection()
            .await
            .map_err(|e| DomainError::OverlayApply(e.to_string()))?;
        let token = conn.closed.child_token();
        self.replace_frame_forwarder(Some(token.clone()));
        tokio::spawn(forward_frames(stream, conn.outgoing.clone(), token));
        Ok(())
    }

    async fn user_context(&self) -> Result<UserContext, DomainError> {
        let value = self
            .request("getUserContext", Value::Null)
            .await
            .map_err(|e| DomainError::HostIdentityLookup(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| DomainError::HostIdentityLookup(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.messages.subscribe()
    }
}
