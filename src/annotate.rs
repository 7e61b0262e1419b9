//! Drawing detections onto images.
//!
//! Boxes arrive normalized to `[0, 1]`; they are mapped to pixel space against
//! the decoded image size, outlined, and labeled with the subject's name.
//! Labels use the configured TrueType font, or DejaVu Sans bundled in
//! `assets/` when none is set.

use ab_glyph::FontArc;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::debug;

use crate::config::{BoxStyle, CelebrityJobConfig};
use crate::schema::{CelebrityDetection, NormalizedBox};

const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("cannot decode source image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("cannot encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
    #[error("cannot load font {path:?}: {reason}")]
    Font { path: String, reason: String },
}

/// Pixel rectangle with inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    /// Scale a normalized box by the image size, truncating toward zero.
    pub fn from_normalized(b: &NormalizedBox, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        Self {
            left: (b.left * w) as i32,
            top: (b.top * h) as i32,
            right: ((b.left + b.width) * w) as i32,
            bottom: ((b.top + b.height) * h) as i32,
        }
    }

    /// The rectangle shrunk by `inset` pixels on every side, if anything is left.
    fn inset(&self, inset: i32) -> Option<Rect> {
        let (left, top) = (self.left + inset, self.top + inset);
        let (right, bottom) = (self.right - inset, self.bottom - inset);
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32))
    }
}

/// Result of [`Annotator::render`].
#[derive(Debug)]
pub struct Rendered {
    pub jpeg: Vec<u8>,
    pub drawn: usize,
}

pub struct Annotator {
    style: BoxStyle,
    min_confidence: f64,
    font: FontArc,
}

impl Annotator {
    pub fn new(style: BoxStyle, min_confidence: f64, font: FontArc) -> Self {
        Self {
            style,
            min_confidence,
            font,
        }
    }

    /// Style, threshold and font of a celebrity job. `font_path` falls back to
    /// the bundled font.
    pub fn for_job(job: &CelebrityJobConfig) -> Result<Self, AnnotateError> {
        let font = match &job.font_path {
            Some(path) => Self::load_font(path)?,
            None => {
                debug!("Annotator: no font_path set, using bundled DejaVu Sans");
                Self::bundled_font()?
            }
        };
        Ok(Self::new(job.style.clone(), job.min_confidence, font))
    }

    pub fn bundled_font() -> Result<FontArc, AnnotateError> {
        FontArc::try_from_slice(BUNDLED_FONT).map_err(|e| AnnotateError::Font {
            path: "<bundled DejaVuSans.ttf>".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn load_font(path: &Path) -> Result<FontArc, AnnotateError> {
        let font_err = |reason: String| AnnotateError::Font {
            path: path.display().to_string(),
            reason,
        };
        let data = std::fs::read(path).map_err(|e| font_err(e.to_string()))?;
        FontArc::try_from_vec(data).map_err(|e| font_err(e.to_string()))
    }

    /// Strictly above the threshold; equality is not drawn.
    pub fn is_drawable(&self, detection: &CelebrityDetection) -> bool {
        detection.match_confidence > self.min_confidence
    }

    /// Draw every drawable detection in place. Returns how many were drawn.
    pub fn annotate(&self, image: &mut RgbImage, detections: &[CelebrityDetection]) -> usize {
        let (width, height) = image.dimensions();
        let box_color = Rgb(self.style.box_color);
        let mut drawn = 0;

        for detection in detections {
            if !self.is_drawable(detection) {
                debug!(
                    "Skipping '{}' ({:.2} <= {:.2})",
                    detection.name, detection.match_confidence, self.min_confidence
                );
                continue;
            }

            let rect = PixelRect::from_normalized(&detection.bounding_box, width, height);
            for i in 0..self.style.border_width as i32 {
                match rect.inset(i) {
                    Some(r) => draw_hollow_rect_mut(image, r, box_color),
                    None => break,
                }
            }

            self.draw_label(image, rect, &detection.name);
            drawn += 1;
        }
        drawn
    }

    /// Filled background at `(left, top - label_offset)` sized to the text,
    /// then the text itself.
    fn draw_label(&self, image: &mut RgbImage, rect: PixelRect, text: &str) {
        if text.is_empty() {
            return;
        }
        let font = &self.font;
        let scale = self.style.font_size;
        let (x, y) = (rect.left, rect.top - self.style.label_offset);
        let (text_w, text_h) = text_size(scale, font, text);
        if text_w > 0 && text_h > 0 {
            draw_filled_rect_mut(
                image,
                Rect::at(x, y).of_size(text_w, text_h),
                Rgb(self.style.box_color),
            );
        }
        draw_text_mut(image, Rgb(self.style.text_color), x, y, scale, font, text);
    }

    /// Decode `source`, draw on a copy, and re-encode it as JPEG.
    pub fn render(
        &self,
        source: &[u8],
        detections: &[CelebrityDetection],
    ) -> Result<Rendered, AnnotateError> {
        let mut image = image::load_from_memory(source)
            .map_err(AnnotateError::Decode)?
            .to_rgb8();
        let drawn = self.annotate(&mut image, detections);

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.style.jpeg_quality)
            .encode_image(&image)
            .map_err(AnnotateError::Encode)?;
        Ok(Rendered { jpeg, drawn })
    }
}
