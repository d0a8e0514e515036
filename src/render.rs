//! Detection overlay.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{Detection, DetectionSet};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;
const LABEL_OFFSET: i32 = 5;

/// Draws detection boxes, and captions when a font is available.
pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    /// Boxes only.
    pub fn new() -> Self {
        Self { font: None }
    }

    /// Boxes with `label: confidence` captions rendered in the given TTF/OTF font.
    pub fn with_font(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow::anyhow!("{} is not a usable font", path.display()))?;
        Ok(Self { font: Some(font) })
    }

    /// Whether `draw` writes captions next to the boxes.
    pub fn has_captions(&self) -> bool {
        self.font.is_some()
    }

    pub fn draw(&self, image: &mut RgbImage, detections: &DetectionSet) {
        for detection in detections {
            draw_box(image, detection);
            if let Some(font) = &self.font {
                draw_text_mut(
                    image,
                    BOX_COLOR,
                    detection.x,
                    detection.y - LABEL_OFFSET,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &caption(detection),
                );
            }
        }
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

/// `label: confidence` with four decimals.
pub fn caption(detection: &Detection) -> String {
    format!("{}: {:.4}", detection.label, detection.confidence)
}

fn draw_box(image: &mut RgbImage, detection: &Detection) {
    if detection.width <= 0 || detection.height <= 0 {
        return;
    }
    for offset in 0..BOX_THICKNESS {
        let rect = Rect::at(detection.x - offset, detection.y - offset).of_size(
            (detection.width + offset * 2) as u32,
            (detection.height + offset * 2) as u32,
        );
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}
