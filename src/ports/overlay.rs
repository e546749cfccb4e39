use std::sync::Arc;

use tokio::sync::watch;

/// One rendered RGBA overlay frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayFrame {
    pub width: u32,
    pub height: u32,
    /// Label drawn into the frame.
    pub label: String,
    /// Premultiplied RGBA pixels, row-major.
    pub pixels: Vec<u8>,
}

impl OverlayFrame {
    /// Fully transparent frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            label: String::new(),
            pixels: vec![0u8; (width * height * 4) as usize],
        }
    }
}

/// Live stream of overlay frames handed to the host's video filter.
pub type OverlayStream = watch::Receiver<Arc<OverlayFrame>>;

/// Port for drawing the countdown overlay.
pub trait OverlayRenderer: Send {
    /// Draw `label` onto a fresh surface.
    fn render(&mut self, label: &str) -> OverlayFrame;
}
