pub mod canvas;
pub mod palette;

use image::Rgba;

use crate::config::RenderConfig;
use crate::models::{BoundingBox, Detection};

pub use canvas::{RgbaCanvas, composite, load_font};
pub use palette::{PALETTE, PaletteColor, color_at};

pub const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// A 2D drawing target.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Reset every pixel to fully transparent.
    fn clear(&mut self);
    fn stroke_rect(&mut self, rect: BoundingBox, color: Rgba<u8>, line_width: u32);
    fn fill_rect(&mut self, rect: BoundingBox, color: Rgba<u8>);
    /// Rendered width of `text` in pixels.
    fn measure_text(&self, text: &str) -> f32;
    /// Draw `text` with its top-left corner at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Rgba<u8>);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub line_width: u32,
    pub label_height: f32,
    pub label_padding: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            line_width: 3,
            label_height: 20.0,
            label_padding: 4.0,
        }
    }
}

impl From<&RenderConfig> for RenderStyle {
    fn from(cfg: &RenderConfig) -> Self {
        Self {
            line_width: cfg.line_width,
            label_height: cfg.label_height as f32,
            ..Self::default()
        }
    }
}

/// Boxes arrive in source pixels and are scaled to the surface. Colors
/// follow detection position, not class.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    style: RenderStyle,
}

impl OverlayRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Clear `surface` and draw every detection, scaled from the source's
    /// native `source_width` x `source_height` into the surface.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        detections: &[Detection],
        source_width: u32,
        source_height: u32,
    ) {
        surface.clear();
        if detections.is_empty() || source_width == 0 || source_height == 0 {
            return;
        }

        let scale_x = surface.width() as f32 / source_width as f32;
        let scale_y = surface.height() as f32 / source_height as f32;

        for (index, detection) in detections.iter().enumerate() {
            let color = color_at(index).rgba();
            let rect = detection.bbox.scaled(scale_x, scale_y);
            surface.stroke_rect(rect, color, self.style.line_width);

            let caption = detection.caption();
            let text_width = surface.measure_text(&caption);
            let label_top = rect.y - self.style.label_height;
            surface.fill_rect(
                BoundingBox::new(
                    rect.x,
                    label_top,
                    text_width + self.style.label_padding * 2.0,
                    self.style.label_height,
                ),
                color,
            );
            surface.fill_text(
                &caption,
                rect.x + self.style.label_padding,
                label_top + 2.0,
                LABEL_TEXT_COLOR,
            );
        }
    }
}
