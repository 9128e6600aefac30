//! Pagelane - bounded-concurrency page dispatch for OCR
//!
//! Pagelane takes page images from a job source, spreads them across the
//! available accelerator devices (at most one in-flight page per device), runs
//! a recognition engine over every page, writes an annotated overlay image and
//! a sidecar text file per page, and returns one result record per page.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use image::RgbImage;
//! use pagelane::engine::{RawDetection, RecognitionEngine};
//! use pagelane::{DispatchConfig, Dispatcher, EngineProvisioning, ImageFileSource, dispatch_sync};
//!
//! struct MyEngine;
//!
//! impl RecognitionEngine for MyEngine {
//!     fn name(&self) -> &str {
//!         "my-engine"
//!     }
//!
//!     fn recognize(&self, _image: &RgbImage, _device_id: usize) -> pagelane::Result<Vec<RawDetection>> {
//!         Ok(vec![RawDetection::from_rect(10.0, 10.0, 120.0, 40.0, "HELLO")])
//!     }
//! }
//!
//! # fn main() -> pagelane::Result<()> {
//! let dispatcher = Dispatcher::new(EngineProvisioning::shared(MyEngine), DispatchConfig::default());
//! let records = dispatch_sync(&dispatcher, &ImageFileSource::new("scans/", "out/"))?;
//! for record in &records {
//!     println!("page {}: {}", record.page, record.page_content);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Job sources** (`source`): decode files or documents into index-aligned pages
//! - **Devices** (`device`): device discovery and one capacity-1 slot per device
//! - **Engines** (`engine`): the opaque recognition capability and its provisioning
//! - **Worker** (`worker`): recognition, box filtering, overlay and sidecar output per page
//! - **Core** (`core`): dispatcher, result aggregation, configuration and file I/O
//!
//! # Features
//!
//! - `pdf`: render PDF pages through a system pdfium library
//! - `otel`: tracing spans on dispatch and worker entry points

#![deny(unsafe_code)]

pub mod core;
pub mod device;
pub mod engine;
pub mod error;
pub mod source;
pub mod types;
pub mod worker;

pub use error::{PagelaneError, Result};
pub use types::*;

pub use core::aggregator::CollectionOrder;
pub use core::config::{DispatchConfig, OverlayConfig};
pub use core::dispatcher::{Dispatcher, assign_devices, dispatch_sync};

pub use device::{DeviceProbe, EnvDeviceProbe, FixedDeviceProbe};
pub use engine::{EngineFactory, EngineProvisioning, RawDetection, RecognitionEngine};
pub use source::{ImageFileSource, JobSource, PageBatch};
