use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::PagelaneError;

/// Label attached to every detection produced by a recognition engine.
pub const OCR_LABEL: &str = "ocr";

/// Score assigned to every surviving detection item.
pub const DETECTION_SCORE: f32 = 1.0;

/// One page of recognition work.
///
/// Created by the dispatcher from a [`PageBatch`](crate::source::PageBatch)
/// and consumed exactly once by a worker.
#[derive(Debug, Clone)]
pub struct Job {
    /// 0-based page index within the batch
    pub index: usize,
    /// Device slot the job runs on
    pub device_id: usize,
    pub image: RgbImage,
    /// Destination of the annotated overlay; the sidecar text lives at `<output_path>.txt`
    pub output_path: PathBuf,
}

impl Job {
    /// 1-based page number reported in the result record.
    pub fn page(&self) -> usize {
        self.index + 1
    }
}

/// Error details attached to a failed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub error_type: String,
    pub message: String,
}

/// Per-page output of a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// 1-based page number
    pub page: usize,
    /// Recognized text, one detected line per row
    pub page_content: String,
    /// Present when the page failed; `page_content` then holds an error marker
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorMetadata>,
}

impl ResultRecord {
    pub fn success(page: usize, page_content: String) -> Self {
        Self {
            page,
            page_content,
            error: None,
        }
    }

    /// Error marker for a page whose job failed.
    pub fn failed(page: usize, error: &PagelaneError) -> Self {
        Self {
            page,
            page_content: format!("Error: {}", error),
            error: Some(ErrorMetadata {
                error_type: error.kind().to_string(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box `(x0, y0, x1, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// A box is degenerate when its corners are inverted on either axis.
    pub fn is_degenerate(&self) -> bool {
        self.x0 > self.x1 || self.y0 > self.y1
    }
}

/// A filtered detection ready for rendering and text extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionItem {
    pub bbox: BoundingBox,
    pub text: String,
    pub kind: String,
    pub score: f32,
}
