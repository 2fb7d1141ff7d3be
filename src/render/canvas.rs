use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage, RgbImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::Surface;
use crate::models::BoundingBox;

/// Average glyph advance relative to the font size, used when no font is loaded.
const FALLBACK_ADVANCE: f32 = 0.55;

/// Transparent RGBA overlay backed by an `image` buffer.
#[derive(Clone)]
pub struct RgbaCanvas {
    image: RgbaImage,
    font: Option<FontArc>,
    font_size: f32,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            font: None,
            font_size: 14.0,
        }
    }

    pub fn with_font(mut self, font: Option<FontArc>, font_size: f32) -> Self {
        self.font = font;
        self.font_size = font_size;
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Draw the overlay on top of `frame`, which must share its dimensions
    /// for the boxes to line up.
    pub fn composite_onto(&self, frame: &RgbImage) -> RgbaImage {
        composite(frame, &self.image)
    }

    fn clip(&self, rect: BoundingBox) -> Option<Rect> {
        let x0 = rect.x.round().max(0.0);
        let y0 = rect.y.round().max(0.0);
        let x1 = rect.right().round().min(self.image.width() as f32);
        let y1 = rect.bottom().round().min(self.image.height() as f32);
        if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
            return None;
        }
        Some(Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Alpha-blend `overlay` over `frame`.
pub fn composite(frame: &RgbImage, overlay: &RgbaImage) -> RgbaImage {
    let mut base = image::DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
    imageops::overlay(&mut base, overlay, 0, 0);
    base
}

/// Load a TrueType/OpenType font for caption text.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font file {}", path.display()))?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| anyhow::anyhow!("invalid font {}: {}", path.display(), e))
}

impl Surface for RgbaCanvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn stroke_rect(&mut self, rect: BoundingBox, color: Rgba<u8>, line_width: u32) {
        // Strokes straddle the path like a 2D canvas stroke does.
        let half = line_width as f32 / 2.0;
        for step in 0..line_width.max(1) {
            let inset = step as f32 - half + 0.5;
            let ring = BoundingBox::new(
                rect.x + inset,
                rect.y + inset,
                rect.width - inset * 2.0,
                rect.height - inset * 2.0,
            );
            if let Some(r) = self.clip_outline(ring) {
                draw_hollow_rect_mut(&mut self.image, r, color);
            }
        }
    }

    fn fill_rect(&mut self, rect: BoundingBox, color: Rgba<u8>) {
        if let Some(r) = self.clip(rect) {
            draw_filled_rect_mut(&mut self.image, r, color);
        }
    }

    fn measure_text(&self, text: &str) -> f32 {
        match &self.font {
            Some(font) => text_size(PxScale::from(self.font_size), font, text).0 as f32,
            None => text.chars().count() as f32 * self.font_size * FALLBACK_ADVANCE,
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Rgba<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        draw_text_mut(
            &mut self.image,
            color,
            x.round() as i32,
            y.round() as i32,
            PxScale::from(self.font_size),
            font,
            text,
        );
    }
}

impl RgbaCanvas {
    /// Outline rects may hang off the canvas; only reject degenerate ones.
    fn clip_outline(&self, rect: BoundingBox) -> Option<Rect> {
        if rect.width < 1.0 || rect.height < 1.0 {
            return None;
        }
        Some(
            Rect::at(rect.x.round() as i32, rect.y.round() as i32)
                .of_size(rect.width.round() as u32, rect.height.round() as u32),
        )
    }
}
