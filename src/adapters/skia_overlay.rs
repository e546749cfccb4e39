//! Software overlay renderer using tiny-skia and cosmic-text.
//!
//! Frames are drawn on the CPU into a premultiplied RGBA buffer.

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache};
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};
use tracing::{debug, warn};

use crate::domain::OverlayConfig;
use crate::ports::{OverlayFrame, OverlayRenderer};

/// Banner fill: black at roughly 60% opacity.
const BANNER_RGBA: [u8; 4] = [0, 0, 0, 160];
/// Label color.
const TEXT_RGBA: [u8; 4] = [255, 255, 255, 255];

/// Overlay renderer drawing a translucent banner with a centered label.
pub struct SkiaOverlayRenderer {
    config: OverlayConfig,
    font_system: FontSystem,
    swash_cache: SwashCache,
}

impl SkiaOverlayRenderer {
    pub fn new(config: OverlayConfig) -> Self {
        let font_system = FontSystem::new();
        debug!(
            width = config.width,
            height = config.height,
            fonts = font_system.db().len(),
            "Overlay renderer initialized"
        );

        Self {
            config,
            font_system,
            swash_cache: SwashCache::new(),
        }
    }

    fn paint_banner(&self, pixmap: &mut Pixmap) {
        let banner_height = self.config.banner_height.min(self.config.height) as f32;
        let Some(rect) = Rect::from_xywh(0.0, 0.0, self.config.width as f32, banner_height) else {
            return;
        };

        let [r, g, b, a] = BANNER_RGBA;
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(r, g, b, a));
        paint.anti_alias = false;

        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn paint_label(&mut self, pixmap: &mut Pixmap, label: &str) {
        let font_size = self.config.font_size;
        let metrics = Metrics::new(font_size, font_size * 1.2);
        let mut text_buffer = Buffer::new(&mut self.font_system, metrics);

        let attrs = Attrs::new().family(Family::SansSerif);
        text_buffer.set_text(&mut self.font_system, label, &attrs, Shaping::Advanced, None);
        text_buffer.shape_until_scroll(&mut self.font_system, false);

        let mut text_width = 0.0f32;
        let mut text_height = 0.0f32;
        for run in text_buffer.layout_runs() {
            text_width = text_width.max(run.line_w);
            text_height += run.line_height;
        }

        let banner_height = self.config.banner_height.min(self.config.height) as f32;
        let origin_x = ((self.config.width as f32 - text_width) / 2.0).max(0.0);
        let origin_y = ((banner_height - text_height) / 2.0).max(0.0);

        let [r, g, b, a] = TEXT_RGBA;
        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let data = pixmap.data_mut();

        for run in text_buffer.layout_runs() {
            for glyph in run.glyphs.iter() {
                let physical = glyph.physical((origin_x, origin_y + run.line_y), 1.0);
                let Some(image) = self
                    .swash_cache
                    .get_image(&mut self.font_system, physical.cache_key)
                else {
                    continue;
                };

                let left = physical.x + image.placement.left;
                let top = physical.y - image.placement.top;
                blend_mask(
                    data,
                    (width, height),
                    &image.data,
                    (image.placement.width, image.placement.height),
                    (left, top),
                    [r, g, b, a],
                );
            }
        }
    }
}

/// Alpha-blend an 8-bit coverage mask onto premultiplied RGBA pixels.
fn blend_mask(
    data: &mut [u8],
    (width, height): (i32, i32),
    mask: &[u8],
    (mask_width, mask_height): (u32, u32),
    (left, top): (i32, i32),
    [r, g, b, a]: [u8; 4],
) {
    for my in 0..mask_height as i32 {
        let py = top + my;
        if py < 0 || py >= height {
            continue;
        }
        for mx in 0..mask_width as i32 {
            let px = left + mx;
            if px < 0 || px >= width {
                continue;
            }

            let coverage = match mask.get((my * mask_width as i32 + mx) as usize) {
                Some(&c) if c > 0 => c as u32,
                _ => continue,
            };

            let idx = ((py * width + px) * 4) as usize;
            let src_a = coverage * a as u32 / 255;
            let inv_a = 255 - src_a;

            data[idx] = ((r as u32 * src_a + data[idx] as u32 * inv_a) / 255) as u8;
            data[idx + 1] = ((g as u32 * src_a + data[idx + 1] as u32 * inv_a) / 255) as u8;
            data[idx + 2] = ((b as u32 * src_a + data[idx + 2] as u32 * inv_a) / 255) as u8;
            data[idx + 3] = (src_a + data[idx + 3] as u32 * inv_a / 255) as u8;
        }
    }
}

impl OverlayRenderer for SkiaOverlayRenderer {
    fn render(&mut self, label: &str) -> OverlayFrame {
        let Some(mut pixmap) = Pixmap::new(self.config.width, self.config.height) else {
            warn!(
                width = self.config.width,
                height = self.config.height,
                "Invalid overlay size"
            );
            return OverlayFrame::blank(0, 0);
        };

        pixmap.fill(Color::TRANSPARENT);
        self.paint_banner(&mut pixmap);
        self.paint_label(&mut pixmap, label);

        OverlayFrame {
            width: pixmap.width(),
            height: pixmap.height(),
            label: label.to_string(),
            pixels: pixmap.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(frame: &OverlayFrame, x: u32, y: u32) -> u8 {
        frame.pixels[((y * frame.width + x) * 4 + 3) as usize]
    }

    #[test]
    fn test_banner_covers_top_only() {
        let mut renderer = SkiaOverlayRenderer::new(OverlayConfig {
            width: 320,
            height: 180,
            banner_height: 40,
            font_size: 24.0,
        });

        let frame = renderer.render("01:05");
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 180);
        assert_eq!(frame.label, "01:05");
        assert_eq!(frame.pixels.len(), 320 * 180 * 4);

        // Left edge of the banner is outside the centered label.
        assert_eq!(alpha_at(&frame, 0, 0), BANNER_RGBA[3]);
        assert_eq!(alpha_at(&frame, 0, 39), BANNER_RGBA[3]);
        assert_eq!(alpha_at(&frame, 0, 40), 0);
        assert_eq!(alpha_at(&frame, 319, 179), 0);
    }

    #[test]
    fn test_zero_size_surface_yields_blank_frame() {
        let mut renderer = SkiaOverlayRenderer::new(OverlayConfig {
            width: 0,
            height: 0,
            banner_height: 0,
            font_size: 12.0,
        });

        let frame = renderer.render("00:00");
        assert!(frame.pixels.is_empty());
    }

    #[test]
    fn test_blend_mask_clips_to_surface() {
        let mut data = vec![0u8; 2 * 2 * 4];
        blend_mask(
            &mut data,
            (2, 2),
            &[255, 255, 255, 255],
            (2, 2),
            (1, 1),
            [255, 255, 255, 255],
        );

        // Only the bottom-right pixel lies inside the surface.
        assert_eq!(&data[12..16], &[255, 255, 255, 255]);
        assert!(data[..12].iter().all(|&v| v == 0));
    }
}
