pub mod audio;
pub mod config;
pub mod host;
pub mod overlay;
pub mod scheduler;
pub mod source;
pub mod view;

pub use audio::{AudioPlayer, AudioTrack, LoadErrorHandler};
pub use config::ConfigStore;
pub use host::HostBridge;
pub use overlay::{OverlayFrame, OverlayRenderer, OverlayStream};
pub use scheduler::{Clock, Scheduler, TaskHandle, TickFn};
pub use source::AudioSource;
pub use view::StatusView;
