use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::domain::audio::PlaybackEvent;
use crate::domain::DomainError;
use crate::ports::{AudioPlayer, AudioSource, AudioTrack, LoadErrorHandler};

/// How often the playback thread checks for the end of a track.
const END_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Commands sent to the playback thread.
enum PlaybackCommand {
    Play {
        track_id: u64,
        url: String,
        bytes: Arc<[u8]>,
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Reset {
        track_id: u64,
    },
    Shutdown,
}

/// Load progress of a track.
#[derive(Clone)]
enum LoadState {
    Pending,
    Ready(Arc<[u8]>),
    Failed(String),
}

/// Owner of the playback thread, spawned on first use.
///
/// The output stream is opened lazily so that machines without an audio
/// device can still run timers.
struct PlaybackWorker {
    sender: OnceCell<mpsc::Sender<PlaybackCommand>>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackWorker {
    fn sender(&self) -> Result<&mpsc::Sender<PlaybackCommand>, DomainError> {
        self.sender.get_or_try_init(|| {
            let (tx, rx) = mpsc::channel();
            let events = self.events.clone();
            thread::Builder::new()
                .name("meetclock-audio".to_string())
                .spawn(move || playback_thread(rx, events))
                .map_err(|e| {
                    DomainError::AudioPlayback(format!("Failed to spawn audio thread: {}", e))
                })?;
            Ok(tx)
        })
    }

    async fn play(&self, track_id: u64, url: &str, bytes: Arc<[u8]>) -> Result<(), DomainError> {
        let (reply, response) = oneshot::channel();
        self.sender()?
            .send(PlaybackCommand::Play {
                track_id,
                url: url.to_string(),
                bytes,
                reply,
            })
            .map_err(|_| DomainError::AudioPlayback("Audio thread has stopped".to_string()))?;

        response
            .await
            .map_err(|_| DomainError::AudioPlayback("Audio thread dropped the request".to_string()))?
    }

    fn reset(&self, track_id: u64) {
        // Nothing can be playing before the thread exists.
        if let Some(sender) = self.sender.get() {
            let _ = sender.send(PlaybackCommand::Reset { track_id });
        }
    }
}

impl Drop for PlaybackWorker {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.get() {
            let _ = sender.send(PlaybackCommand::Shutdown);
        }
    }
}

fn open_output() -> Result<(OutputStream, Sink), DomainError> {
    let stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| DomainError::AudioPlayback(format!("No audio output: {}", e)))?;
    let sink = Sink::connect_new(stream.mixer());
    Ok((stream, sink))
}

fn start_playback(
    output: &mut Option<(OutputStream, Sink)>,
    bytes: Arc<[u8]>,
) -> Result<(), DomainError> {
    if output.is_none() {
        *output = Some(open_output()?);
    }
    let Some((_, sink)) = output.as_ref() else {
        return Err(DomainError::AudioPlayback("No audio output".to_string()));
    };

    let source = Decoder::new(Cursor::new(bytes))
        .map_err(|e| DomainError::AudioPlayback(format!("Failed to decode audio: {}", e)))?;

    sink.clear();
    sink.append(source);
    sink.play();
    Ok(())
}

fn playback_thread(
    commands: mpsc::Receiver<PlaybackCommand>,
    events: broadcast::Sender<PlaybackEvent>,
) {
    let mut output: Option<(OutputStream, Sink)> = None;
    let mut current: Option<(u64, String)> = None;

    debug!("Audio thread started");

    loop {
        match commands.recv_timeout(END_POLL_INTERVAL) {
            Ok(PlaybackCommand::Play {
                track_id,
                url,
                bytes,
                reply,
            }) => {
                let result = start_playback(&mut output, bytes);
                match &result {
                    Ok(()) => {
                        info!(url = %url, "Playback started");
                        let _ = events.send(PlaybackEvent::Started { url: url.clone() });
                        current = Some((track_id, url));
                    }
                    Err(e) => {
                        error!(url = %url, error = %e, "Playback failed");
                        let _ = events.send(PlaybackEvent::Error {
                            url,
                            message: e.to_string(),
                        });
                    }
                }
                let _ = reply.send(result);
            }
            Ok(PlaybackCommand::Reset { track_id }) => {
                if current.as_ref().is_some_and(|(id, _)| *id == track_id) {
                    if let Some((_, sink)) = output.as_ref() {
                        sink.clear();
                    }
                    current = None;
                    debug!(track_id, "Playback reset");
                }
            }
            Ok(PlaybackCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let finished = match (&current, &output) {
            (Some(_), Some((_, sink))) => sink.empty(),
            _ => false,
        };
        if finished {
            if let Some((_, url)) = current.take() {
                debug!(url = %url, "Playback ended");
                let _ = events.send(PlaybackEvent::Ended { url });
            }
        }
    }

    debug!("Audio thread stopped");
}

/// Audio player decoding with rodio on a dedicated thread.
pub struct RodioAudioPlayer {
    source: Arc<dyn AudioSource>,
    worker: Arc<PlaybackWorker>,
    next_track_id: AtomicU64,
}

impl RodioAudioPlayer {
    pub fn new(source: Arc<dyn AudioSource>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            source,
            worker: Arc::new(PlaybackWorker {
                sender: OnceCell::new(),
                events,
            }),
            next_track_id: AtomicU64::new(1),
        }
    }
}

impl AudioPlayer for RodioAudioPlayer {
    fn load(&self, url: &str, on_load_error: LoadErrorHandler) -> Arc<dyn AudioTrack> {
        let (state_tx, state_rx) = watch::channel(LoadState::Pending);
        let source = Arc::clone(&self.source);
        let task_url = url.to_string();

        tokio::spawn(async move {
            let loaded = match source.fetch(&task_url).await {
                Ok(bytes) => {
                    let bytes: Arc<[u8]> = Arc::from(bytes);
                    Decoder::new(Cursor::new(Arc::clone(&bytes)))
                        .map(|_| bytes)
                        .map_err(|e| DomainError::AudioLoad(format!("Unsupported audio: {}", e)))
                }
                Err(e) => Err(e),
            };

            match loaded {
                Ok(bytes) => {
                    debug!(url = %task_url, size = bytes.len(), "Audio loaded");
                    let _ = state_tx.send(LoadState::Ready(bytes));
                }
                Err(e) => {
                    warn!(url = %task_url, error = %e, "Audio load failed");
                    let _ = state_tx.send(LoadState::Failed(e.to_string()));
                    on_load_error(e);
                }
            }
        });

        Arc::new(RodioTrack {
            id: self.next_track_id.fetch_add(1, Ordering::Relaxed),
            url: url.to_string(),
            state: state_rx,
            worker: Arc::clone(&self.worker),
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.worker.events.subscribe()
    }
}

/// A track loaded by [`RodioAudioPlayer`].
struct RodioTrack {
    id: u64,
    url: String,
    state: watch::Receiver<LoadState>,
    worker: Arc<PlaybackWorker>,
}

#[async_trait]
impl AudioTrack for RodioTrack {
    fn url(&self) -> &str {
        &self.url
    }

    async fn play(&self) -> Result<(), DomainError> {
        let mut state = self.state.clone();
        let loaded = state
            .wait_for(|s| !matches!(s, LoadState::Pending))
            .await
            .map_err(|_| DomainError::AudioPlayback("Audio loading was abandoned".to_string()))?
            .clone();

        match loaded {
            LoadState::Ready(bytes) => self.worker.play(self.id, &self.url, bytes).await,
            LoadState::Failed(reason) => Err(DomainError::AudioPlayback(format!(
                "audio not loaded: {}",
                reason
            ))),
            LoadState::Pending => Err(DomainError::AudioPlayback("audio still loading".to_string())),
        }
    }

    fn reset(&self) {
        self.worker.reset(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct StaticSource {
        body: Result<Vec<u8>, DomainError>,
    }

    #[async_trait]
    impl AudioSource for StaticSource {
        async fn probe(&self, _url: &str) -> Result<(), DomainError> {
            Ok(())
        }

        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, DomainError> {
            self.body.clone()
        }
    }

    fn player(body: Result<Vec<u8>, DomainError>) -> RodioAudioPlayer {
        RodioAudioPlayer::new(Arc::new(StaticSource { body }))
    }

    fn recording_handler() -> (LoadErrorHandler, Arc<Mutex<Vec<DomainError>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        (Box::new(move |e| sink.lock().push(e)), errors)
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_load_error() {
        let player = player(Err(DomainError::AudioLoad("HTTP 404".to_string())));
        let (handler, errors) = recording_handler();

        let track = player.load("https://cdn.example.com/missing.mp3", handler);
        let result = track.play().await;

        assert!(matches!(result, Err(DomainError::AudioPlayback(_))));
        assert_eq!(
            errors.lock().as_slice(),
            &[DomainError::AudioLoad("HTTP 404".to_string())]
        );
    }

    #[tokio::test]
    async fn test_undecodable_body_reports_load_error() {
        let player = player(Ok(b"<html>not audio</html>".to_vec()));
        let (handler, errors) = recording_handler();

        let track = player.load("https://cdn.example.com/page", handler);
        assert_eq!(track.url(), "https://cdn.example.com/page");
        assert!(track.play().await.is_err());

        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], DomainError::AudioLoad(_)));
    }

    #[tokio::test]
    async fn test_reset_before_playback_is_noop() {
        let player = player(Err(DomainError::AudioLoad("offline".to_string())));
        let (handler, _errors) = recording_handler();

        let track = player.load("https://cdn.example.com/gong.mp3", handler);
        track.reset();
        assert!(player.worker.sender.get().is_none());
    }
}
