pub mod config_store;
pub mod http_audio;
pub mod relay_host;
pub mod rodio_audio;
pub mod skia_overlay;
pub mod terminal_view;
pub mod tokio_scheduler;

pub use config_store::TomlConfigStore;
pub use http_audio::HttpAudioSource;
pub use relay_host::RelayHostBridge;
pub use rodio_audio::RodioAudioPlayer;
pub use skia_overlay::SkiaOverlayRenderer;
pub use terminal_view::{TerminalView, ViewSnapshot};
pub use tokio_scheduler::{SystemClock, TokioScheduler};
