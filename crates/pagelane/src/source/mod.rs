//! Job sources.
//!
//! A [`JobSource`] turns some input (files, uploads, rendered documents) into a
//! [`PageBatch`]: index-aligned page images and overlay output paths. Sources
//! only decode; they never run recognition.

pub mod image_file;
#[cfg(feature = "pdf")]
mod pdf;

pub use image_file::ImageFileSource;

use crate::device::device_for_index;
use crate::types::Job;
use crate::{PagelaneError, Result};
use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// File extensions accepted by [`ImageFileSource`] (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff"];

/// Producer of page images for one dispatch call.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Decode the input into a batch of pages.
    ///
    /// # Errors
    ///
    /// Failures are call-level: `PagelaneError::InputMaterialization` for
    /// unreadable input, `PagelaneError::UnsupportedFormat` for rejected file types.
    async fn materialize(&self) -> Result<PageBatch>;
}

/// Index-aligned page images and overlay destinations.
#[derive(Debug, Clone, Default)]
pub struct PageBatch {
    images: Vec<RgbImage>,
    output_paths: Vec<PathBuf>,
}

impl PageBatch {
    /// Build a batch from parallel lists.
    ///
    /// # Errors
    ///
    /// Returns `PagelaneError::InputMaterialization` if the lists differ in length.
    pub fn new(images: Vec<RgbImage>, output_paths: Vec<PathBuf>) -> Result<Self> {
        if images.len() != output_paths.len() {
            return Err(PagelaneError::input_materialization(format!(
                "Page batch is misaligned: {} images but {} output paths",
                images.len(),
                output_paths.len()
            )));
        }
        Ok(Self { images, output_paths })
    }

    pub fn push(&mut self, image: RgbImage, output_path: PathBuf) {
        self.images.push(image);
        self.output_paths.push(output_path);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn output_paths(&self) -> &[PathBuf] {
        &self.output_paths
    }

    /// Turn the batch into jobs, assigning each page its device slot.
    pub fn into_jobs(self, device_count: usize) -> Vec<Job> {
        self.images
            .into_iter()
            .zip(self.output_paths)
            .enumerate()
            .map(|(index, (image, output_path))| Job {
                index,
                device_id: device_for_index(index, device_count),
                image,
                output_path,
            })
            .collect()
    }
}

/// Whether `file_name` carries one of the [`ALLOWED_EXTENSIONS`].
///
/// Names without a `.` are never allowed.
pub fn is_allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
}

pub(crate) fn is_allowed_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(is_allowed_file)
}
