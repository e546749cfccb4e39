use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::audio::PlaybackEvent;
use crate::domain::DomainError;

/// Handler invoked when a track fails to load.
pub type LoadErrorHandler = Box<dyn Fn(DomainError) + Send + Sync>;

/// Port for audio cue playback.
///
/// Implementations load tracks lazily: `load` returns immediately and the
/// resource is fetched in the background.
pub trait AudioPlayer: Send + Sync {
    /// Start loading the track at `url`.
    ///
    /// `on_load_error` is called at most once if the resource cannot be
    /// fetched or decoded.
    fn load(&self, url: &str, on_load_error: LoadErrorHandler) -> Arc<dyn AudioTrack>;

    /// Subscribe to playback events.
    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent>;
}

/// A loaded (or loading) audio resource.
#[async_trait]
pub trait AudioTrack: Send + Sync {
    /// URL the track was loaded from.
    fn url(&self) -> &str;

    /// Play from the current position.
    ///
    /// Waits for loading to finish. Returns once playback has started.
    async fn play(&self) -> Result<(), DomainError>;

    /// Pause and rewind to position zero.
    fn reset(&self);
}
