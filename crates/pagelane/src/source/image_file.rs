//! File-system job source.
//!
//! Reads a single file or every allowed file under a directory and lays out
//! overlay paths in an output directory:
//!
//! - a single-page image `scan.png` becomes `<output_dir>/scan.png`
//! - every page `i` of a multi-page document (PDF, multi-frame TIFF) becomes
//!   `<output_dir>/<file_name>_<i>.jpg`

use super::{JobSource, PageBatch, is_allowed_path};
use crate::core::io;
use crate::{PagelaneError, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, RgbImage};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};

/// Job source backed by image and document files on disk.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    input: PathBuf,
    output_dir: PathBuf,
}

impl ImageFileSource {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Files this source will read, in processing order.
    ///
    /// # Errors
    ///
    /// - `PagelaneError::InputMaterialization` if the input is missing or unreadable
    /// - `PagelaneError::UnsupportedFormat` if a single input file has a rejected extension
    pub fn collect_files(&self) -> Result<Vec<PathBuf>> {
        io::validate_path_exists(&self.input).map_err(|e| {
            PagelaneError::input_materialization_with_source(format!("Cannot read input {}", self.input.display()), e)
        })?;

        if self.input.is_dir() {
            return io::traverse_directory(&self.input, true, Some(is_allowed_path)).map_err(|e| {
                PagelaneError::input_materialization_with_source(
                    format!("Cannot enumerate {}", self.input.display()),
                    e,
                )
            });
        }

        if !is_allowed_path(&self.input) {
            return Err(PagelaneError::UnsupportedFormat(format!(
                "{} (allowed: {})",
                self.input.display(),
                super::ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        Ok(vec![self.input.clone()])
    }

    fn materialize_blocking(&self) -> Result<PageBatch> {
        let files = self.collect_files()?;

        io::ensure_dir(&self.output_dir).map_err(|e| {
            PagelaneError::input_materialization_with_source(
                format!("Cannot create output directory {}", self.output_dir.display()),
                e,
            )
        })?;

        let mut batch = PageBatch::default();
        for path in &files {
            for (image, output_path) in load_pages(path, &self.output_dir)? {
                batch.push(image, output_path);
            }
        }

        tracing::debug!(
            "Materialized {} pages from {} files under {}",
            batch.len(),
            files.len(),
            self.input.display()
        );

        Ok(batch)
    }
}

#[async_trait]
impl JobSource for ImageFileSource {
    async fn materialize(&self) -> Result<PageBatch> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.materialize_blocking())
            .await
            .map_err(|e| PagelaneError::input_materialization(format!("Input decoding task failed: {}", e)))?
    }
}

/// Decode one file into its pages and their overlay paths.
///
/// # Errors
///
/// - `PagelaneError::InputMaterialization` if the file cannot be decoded
/// - `PagelaneError::UnsupportedFormat` for PDFs when PDF support is not compiled in
pub fn load_pages(path: &Path, output_dir: &Path) -> Result<Vec<(RgbImage, PathBuf)>> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PagelaneError::input_materialization(format!("Invalid file name: {}", path.display())))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let multi_page_paths = |pages: Vec<RgbImage>| {
        pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| (page, output_dir.join(format!("{}_{}.jpg", file_name, i))))
            .collect::<Vec<_>>()
    };

    match extension.as_str() {
        "pdf" => Ok(multi_page_paths(render_pdf(path)?)),
        "tif" | "tiff" => {
            let mut frames = decode_tiff_frames(path)?;
            if frames.len() == 1 {
                let frame = frames.remove(0);
                Ok(vec![(frame, output_dir.join(file_name))])
            } else {
                Ok(multi_page_paths(frames))
            }
        }
        _ => {
            let image = image::open(path).map_err(|e| {
                PagelaneError::input_materialization_with_source(format!("Failed to decode {}", path.display()), e)
            })?;
            Ok(vec![(image.to_rgb8(), output_dir.join(file_name))])
        }
    }
}

#[cfg(feature = "pdf")]
fn render_pdf(path: &Path) -> Result<Vec<RgbImage>> {
    super::pdf::render_pdf_pages(path)
}

#[cfg(not(feature = "pdf"))]
fn render_pdf(path: &Path) -> Result<Vec<RgbImage>> {
    Err(PagelaneError::UnsupportedFormat(format!(
        "{} (PDF support requires the `pdf` feature)",
        path.display()
    )))
}

/// Decode every frame of a TIFF file to RGB.
fn decode_tiff_frames(path: &Path) -> Result<Vec<RgbImage>> {
    let tiff_error = |e: tiff::TiffError| {
        PagelaneError::input_materialization(format!("TIFF decode of {}: {}", path.display(), e))
    };

    let file = File::open(path).map_err(|e| {
        PagelaneError::input_materialization_with_source(format!("Failed to open {}", path.display()), e)
    })?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_error)?;

    let mut frames = Vec::new();
    loop {
        let (width, height) = decoder.dimensions().map_err(tiff_error)?;
        let color = decoder.colortype().map_err(tiff_error)?;
        let data = decoder.read_image().map_err(tiff_error)?;
        let index = frames.len();
        let frame = tiff_frame_to_rgb(width, height, color, data).map_err(|e| {
            PagelaneError::input_materialization_with_source(format!("Frame {} of {}", index, path.display()), e)
        })?;
        frames.push(frame);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_error)?;
    }

    Ok(frames)
}

fn tiff_frame_to_rgb(width: u32, height: u32, color: ColorType, data: DecodingResult) -> Result<RgbImage> {
    let DecodingResult::U8(buf) = data else {
        return Err(PagelaneError::UnsupportedFormat(format!(
            "TIFF sample format of {:?} frames",
            color
        )));
    };

    let image = match color {
        ColorType::Gray(8) => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma8),
        ColorType::GrayA(8) => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8),
        ColorType::RGB(8) => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
        ColorType::RGBA(8) => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba8),
        other => {
            return Err(PagelaneError::UnsupportedFormat(format!("TIFF color type {:?}", other)));
        }
    };

    image
        .map(|image| image.to_rgb8())
        .ok_or_else(|| {
            PagelaneError::image_processing(format!("TIFF frame buffer does not match {}x{}", width, height))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiff_frame_to_rgb_gray() {
        let image = tiff_frame_to_rgb(2, 1, ColorType::Gray(8), DecodingResult::U8(vec![0, 255])).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_tiff_frame_to_rgb_rgba_drops_alpha() {
        let image = tiff_frame_to_rgb(1, 1, ColorType::RGBA(8), DecodingResult::U8(vec![10, 20, 30, 0])).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_tiff_frame_to_rgb_short_buffer() {
        let result = tiff_frame_to_rgb(4, 4, ColorType::RGB(8), DecodingResult::U8(vec![0; 3]));
        assert!(matches!(result, Err(PagelaneError::ImageProcessing { .. })));
    }

    #[test]
    fn test_tiff_frame_to_rgb_rejects_16_bit() {
        let result = tiff_frame_to_rgb(1, 1, ColorType::Gray(16), DecodingResult::U16(vec![0]));
        assert!(matches!(result, Err(PagelaneError::UnsupportedFormat(_))));
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn test_pdf_requires_feature() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("scan.pdf");
        std::fs::write(&pdf, b"%PDF-1.4\n").unwrap();

        let result = load_pages(&pdf, dir.path());
        assert!(matches!(result, Err(PagelaneError::UnsupportedFormat(_))));
    }
}
