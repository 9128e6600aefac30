//! Per-page recognition worker.
//!
//! A worker turns one [`Job`] into one [`ResultRecord`]:
//!
//! 1. run the engine over the page image
//! 2. drop detections with inverted corners
//! 3. draw the surviving boxes onto a copy of the image and save it to the job's output path
//! 4. write the recognized lines to `<output_path>.txt` and read them back
//!
//! Workers are synchronous and are run on tokio's blocking pool by the dispatcher.

pub mod overlay;

use crate::core::config::OverlayConfig;
use crate::core::io;
use crate::engine::{RawDetection, RecognitionEngine};
use crate::types::{BoundingBox, DETECTION_SCORE, DetectionItem, Job, OCR_LABEL, ResultRecord};
use crate::{PagelaneError, Result};

/// Labels rendered onto overlays, in palette order.
pub const OVERLAY_LABELS: &[&str] = &[OCR_LABEL];

/// Convert raw engine detections into detection items, discarding degenerate boxes.
///
/// The box of a detection spans from its top-left corner to the x of its
/// top-right corner and the y of its bottom-left corner.
pub fn filter_detections(raw: Vec<RawDetection>) -> Vec<DetectionItem> {
    raw.into_iter()
        .filter_map(|det| {
            let [top_left, top_right, _, bottom_left] = det.polygon;
            let bbox = BoundingBox::new(top_left.x, top_left.y, top_right.x, bottom_left.y);
            if bbox.is_degenerate() {
                tracing::debug!("Dropping detection with inverted box {:?}: {:?}", bbox, det.text);
                return None;
            }
            Some(DetectionItem {
                bbox,
                text: det.text,
                kind: OCR_LABEL.to_string(),
                score: DETECTION_SCORE,
            })
        })
        .collect()
}

/// Process one job end to end.
///
/// Writes exactly two files: the overlay at `job.output_path` and the sidecar
/// text at `<output_path>.txt`.
///
/// # Errors
///
/// - `PagelaneError::Recognition` if the engine fails
/// - `PagelaneError::Persistence` if the overlay or sidecar cannot be written or read back
#[cfg_attr(feature = "otel", tracing::instrument(
    skip(engine, job, config),
    fields(
        page = job.page(),
        device_id = job.device_id,
        engine = engine.name(),
    )
))]
pub fn run_job(engine: &dyn RecognitionEngine, job: Job, config: &OverlayConfig) -> Result<ResultRecord> {
    let page = job.page();

    let raw = engine.recognize(&job.image, job.device_id).map_err(|e| {
        if e.is_job_scoped() {
            e
        } else {
            PagelaneError::recognition_with_source(
                format!("Engine '{}' failed on page {}", engine.name(), page),
                e,
            )
        }
    })?;

    let items = filter_detections(raw);

    let rendered = overlay::render_overlay(&job.image, &items, OVERLAY_LABELS, config);
    overlay::save_overlay(&rendered, &job.output_path, config.quality)?;

    let text = items.iter().map(|item| item.text.as_str()).collect::<Vec<_>>().join("\n");
    let page_content = io::write_sidecar(&job.output_path, &text)?;

    tracing::info!(
        "Page {} on device {} done: {} detections -> {}",
        page,
        job.device_id,
        items.len(),
        job.output_path.display()
    );

    Ok(ResultRecord::success(page, page_content))
}
