use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{
    HttpAudioSource, RelayHostBridge, RodioAudioPlayer, SkiaOverlayRenderer, SystemClock,
    TerminalView, TokioScheduler, TomlConfigStore,
};
use crate::app::timer::{TimerController, TimerPorts};
use crate::domain::{AppConfig, DomainError, PlaybackEvent};
use crate::infrastructure::init_logging;
use crate::ports::{AudioPlayer, AudioSource, ConfigStore, HostBridge, StatusView};

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub config_path: Option<PathBuf>,
    pub relay_url: Option<String>,
    pub log_level: Option<String>,
}

/// Application controller that wires adapters together and owns global state.
pub struct AppController {
    config: RwLock<AppConfig>,
    config_store: Arc<TomlConfigStore>,
    timer: TimerController,
    audio: Arc<dyn AudioPlayer>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Load configuration, start logging and build the timer.
    pub fn new(options: AppOptions) -> Result<Self, DomainError> {
        let config_store = Arc::new(match options.config_path {
            Some(path) => TomlConfigStore::at(path)?,
            None => TomlConfigStore::new()?,
        });

        let mut config = config_store.load()?;
        if let Some(url) = options.relay_url {
            config.host.relay_url = url;
        }
        if let Some(level) = options.log_level {
            config.logging.level = level;
        }

        let log_guard = init_logging(&config_store.logs_dir(), &config.logging)?;

        info!(version = env!("CARGO_PKG_VERSION"), "MeetClock starting up");

        let request_timeout = Duration::from_millis(config.host.request_timeout_ms);
        let source: Arc<dyn AudioSource> = Arc::new(HttpAudioSource::new(request_timeout)?);
        let audio: Arc<dyn AudioPlayer> = Arc::new(RodioAudioPlayer::new(Arc::clone(&source)));
        let host: Arc<dyn HostBridge> = Arc::new(RelayHostBridge::new(
            config.host.relay_url.clone(),
            request_timeout,
        ));
        let view: Arc<dyn StatusView> = Arc::new(TerminalView::stdout());

        let timer = TimerController::new(
            TimerPorts {
                clock: Arc::new(SystemClock),
                scheduler: Arc::new(TokioScheduler),
                audio: Arc::clone(&audio),
                source,
                host,
                view,
                renderer: Box::new(SkiaOverlayRenderer::new(config.overlay.clone())),
            },
            config.features,
        );

        info!(
            relay_url = %config.host.relay_url,
            broadcast = config.features.broadcast,
            video_overlay = config.features.video_overlay,
            "AppController initialized"
        );

        Ok(Self {
            config: RwLock::new(config),
            config_store,
            timer,
            audio,
            _log_guard: log_guard,
        })
    }

    /// Wait for the host and start listening for peers.
    ///
    /// Returns whether the host is usable; the local timer works either way.
    pub async fn connect(&self) -> bool {
        let policy = self.config.read().host.retry_policy();

        match self.timer.connect_host(&policy).await {
            Ok(()) => {
                self.timer.listen();
                true
            }
            Err(e) => {
                warn!(error = %e, "Continuing without host bridge");
                false
            }
        }
    }

    pub fn timer(&self) -> &TimerController {
        &self.timer
    }

    /// Playback lifecycle events from the audio player.
    pub fn playback_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.audio.subscribe()
    }

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    pub fn logs_dir(&self) -> String {
        self.config_store.logs_dir().to_string_lossy().to_string()
    }

    pub fn config_path(&self) -> String {
        self.config_store.config_path().to_string_lossy().to_string()
    }

    /// Stop the timer and detach from the host.
    pub async fn shutdown(&self) {
        self.timer.dispose().await;
        info!("MeetClock shut down");
    }
}
