//! Annotated overlay rendering and persistence.

use crate::core::config::OverlayConfig;
use crate::types::{BoundingBox, DetectionItem};
use crate::{PagelaneError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Colour for label `index` in a VOC-style palette.
///
/// The bits of the index are spread over the high bits of the three channels,
/// so neighbouring labels get clearly different colours. Index 0 is black.
pub fn label_color(index: usize) -> Rgb<u8> {
    let mut rgb = [0u8; 3];
    let mut lab = index;
    let mut bit = 0;

    while lab > 0 && bit < 8 {
        for (channel, value) in rgb.iter_mut().enumerate() {
            *value |= (((lab >> channel) & 1) as u8) << (7 - bit);
        }
        bit += 1;
        lab >>= 3;
    }

    Rgb(rgb)
}

/// Draw the detections onto a copy of `image`.
///
/// Items whose kind is not in `labels` or whose score is below
/// `config.draw_threshold` are skipped.
pub fn render_overlay(image: &RgbImage, items: &[DetectionItem], labels: &[&str], config: &OverlayConfig) -> RgbImage {
    let mut canvas = image.clone();

    for item in items {
        if item.score < config.draw_threshold {
            continue;
        }
        let Some(label_index) = labels.iter().position(|label| *label == item.kind) else {
            continue;
        };
        draw_box(&mut canvas, &item.bbox, label_color(label_index), config.line_width);
    }

    canvas
}

fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, line_width: u32) {
    if bbox.is_degenerate() {
        return;
    }

    let (width, height) = canvas.dimensions();
    // Rings past the larger canvas side never touch a pixel.
    let pad = i64::from(line_width.min(width.max(height)));
    let clamp_x = |v: f32| (v.round() as i64).clamp(-pad, i64::from(width) + pad);
    let clamp_y = |v: f32| (v.round() as i64).clamp(-pad, i64::from(height) + pad);

    let (x0, y0, x1, y1) = (clamp_x(bbox.x0), clamp_y(bbox.y0), clamp_x(bbox.x1), clamp_y(bbox.y1));

    for t in 0..pad {
        let rect = Rect::at((x0 - t) as i32, (y0 - t) as i32)
            .of_size((x1 - x0 + 1 + 2 * t) as u32, (y1 - y0 + 1 + 2 * t) as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Write the overlay to `path`.
///
/// JPEG destinations are encoded with `quality`; any other extension uses the
/// format implied by the extension.
///
/// # Errors
///
/// Returns `PagelaneError::Persistence` if the file cannot be created or encoded.
pub fn save_overlay(overlay: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => {
            let file = File::create(path).map_err(|e| persistence_error(path, e))?;
            let mut writer = BufWriter::new(file);
            JpegEncoder::new_with_quality(&mut writer, quality)
                .encode_image(overlay)
                .map_err(|e| persistence_error(path, e))?;
            writer.flush().map_err(|e| persistence_error(path, e))
        }
        _ => overlay.save(path).map_err(|e| persistence_error(path, e)),
    }
}

fn persistence_error<E: std::error::Error + Send + Sync + 'static>(path: &Path, err: E) -> PagelaneError {
    PagelaneError::persistence_with_source(format!("Failed to write overlay {}", path.display()), err)
}
