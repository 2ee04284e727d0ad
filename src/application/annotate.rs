use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use base64::{prelude::BASE64_STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::warn;

use crate::domain::{
    detection::DetectionResult,
    errors::{DomainError, DomainResult},
};

const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const JPEG_QUALITY: u8 = 90;

const PALETTE: [[u8; 3]; 8] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [72, 249, 10],
    [0, 194, 255],
    [52, 69, 147],
    [203, 56, 255],
];

/// Draws detections onto a copy of the input and encodes it as a JPEG data URI.
/// Without a font only the boxes are drawn.
pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// A missing or unreadable font is not fatal: boxes are still drawn.
    pub fn from_font_path(path: Option<&Path>) -> Self {
        let font = path.and_then(|p| {
            let loaded = std::fs::read(p)
                .map_err(|e| e.to_string())
                .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|e| e.to_string()));
            match loaded {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "could not load label font, drawing boxes only");
                    None
                }
            }
        });
        Self { font }
    }

    pub fn annotate(&self, image: &RgbImage, detections: &[DetectionResult]) -> DomainResult<String> {
        let mut canvas = image.clone();
        for det in detections {
            self.draw_detection(&mut canvas, det);
        }
        encode_data_uri(&canvas)
    }

    fn draw_detection(&self, canvas: &mut RgbImage, det: &DetectionResult) {
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        if w == 0 || h == 0 {
            return;
        }

        let x1 = (det.bbox.x1.floor() as i32).clamp(0, w - 1);
        let y1 = (det.bbox.y1.floor() as i32).clamp(0, h - 1);
        let x2 = (det.bbox.x2.ceil() as i32).clamp(0, w - 1);
        let y2 = (det.bbox.y2.ceil() as i32).clamp(0, h - 1);
        if x1 >= x2 || y1 >= y2 {
            return;
        }

        let color = Rgb(PALETTE[det.class_id as usize % PALETTE.len()]);
        for t in 0..BOX_THICKNESS {
            let (bw, bh) = (x2 - x1 - 2 * t, y2 - y1 - 2 * t);
            if bw <= 0 || bh <= 0 {
                break;
            }
            draw_hollow_rect_mut(canvas, Rect::at(x1 + t, y1 + t).of_size(bw as u32, bh as u32), color);
        }

        let Some(font) = &self.font else { return };

        let label = format!("{} {:.2}", det.class_name, det.confidence);
        let scale = PxScale::from(LABEL_FONT_SIZE);
        let (tw, th) = text_size(scale, font, &label);
        let label_w = (tw as i32 + 2 * LABEL_PADDING).min(w - x1);
        let label_h = th as i32 + 2 * LABEL_PADDING;
        // Above the box when there is room, otherwise just inside it.
        let label_y = if y1 >= label_h { y1 - label_h } else { y1 };

        if label_w > 0 && label_h > 0 {
            draw_filled_rect_mut(canvas, Rect::at(x1, label_y).of_size(label_w as u32, label_h as u32), color);
            draw_text_mut(
                canvas,
                Rgb([255, 255, 255]),
                x1 + LABEL_PADDING,
                label_y + LABEL_PADDING,
                scale,
                font,
                &label,
            );
        }
    }
}

pub fn encode_data_uri(image: &RgbImage) -> DomainResult<String> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| DomainError::Inference(format!("could not encode annotated image: {e}")))?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(buf)))
}
