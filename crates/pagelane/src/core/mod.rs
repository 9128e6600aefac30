//! Core dispatch orchestration module.
//!
//! # Architecture
//!
//! - **Dispatcher**: device assignment, task spawning and the join barrier
//! - **Aggregator**: one-record-per-job collection in completion or page order
//! - **Configuration**: loading and validating dispatch settings
//! - **I/O**: path validation, directory traversal and sidecar files
//!
//! # Example
//!
//! ```rust,no_run
//! use pagelane::core::config::DispatchConfig;
//! use pagelane::core::dispatcher::dispatch_sync;
//! # use pagelane::{Dispatcher, EngineProvisioning, ImageFileSource};
//! # use pagelane::engine::{RawDetection, RecognitionEngine};
//! # struct Engine;
//! # impl RecognitionEngine for Engine {
//! #     fn name(&self) -> &str { "engine" }
//! #     fn recognize(&self, _: &image::RgbImage, _: usize) -> pagelane::Result<Vec<RawDetection>> { Ok(vec![]) }
//! # }
//!
//! # fn main() -> pagelane::Result<()> {
//! let config = DispatchConfig::discover()?.unwrap_or_default();
//! let dispatcher = Dispatcher::new(EngineProvisioning::shared(Engine), config);
//! let records = dispatch_sync(&dispatcher, &ImageFileSource::new("scan.tiff", "out/"))?;
//! println!("{} pages", records.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod io;

pub use aggregator::{CollectionOrder, ResultAggregator};
pub use config::{DispatchConfig, OverlayConfig};
pub use dispatcher::{Dispatcher, assign_devices, dispatch_sync};
