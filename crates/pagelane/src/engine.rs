//! Recognition engine contract.
//!
//! The detection/recognition model is an opaque capability. Engines are passed
//! explicitly into every worker through an [`EngineSet`]; there is no
//! process-wide engine instance.
//!
//! # Thread Safety
//!
//! Engines must be `Send + Sync` because jobs on different devices run on
//! different blocking threads at the same time. An engine whose inference call
//! must not be entered concurrently reports `is_concurrency_safe() == false`
//! and has to be provisioned per device with [`EngineProvisioning::PerDevice`];
//! within one device slot calls are always serialized.

use crate::types::Point;
use crate::{PagelaneError, Result};
use image::RgbImage;
use std::fmt;
use std::sync::Arc;

/// One raw detection as reported by an engine.
///
/// `polygon` holds the corners in top-left, top-right, bottom-right,
/// bottom-left order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub polygon: [Point; 4],
    pub text: String,
    pub confidence: f32,
}

impl RawDetection {
    /// Detection for an axis-aligned rectangle.
    pub fn from_rect(x0: f32, y0: f32, x1: f32, y1: f32, text: impl Into<String>) -> Self {
        Self {
            polygon: [
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
            ],
            text: text.into(),
            confidence: 1.0,
        }
    }
}

/// Detection/recognition capability used by workers.
///
/// # Example
///
/// ```rust
/// use image::RgbImage;
/// use pagelane::engine::{RawDetection, RecognitionEngine};
/// use pagelane::Result;
///
/// struct FixedText;
///
/// impl RecognitionEngine for FixedText {
///     fn name(&self) -> &str {
///         "fixed-text"
///     }
///
///     fn recognize(&self, image: &RgbImage, _device_id: usize) -> Result<Vec<RawDetection>> {
///         let (w, h) = image.dimensions();
///         Ok(vec![RawDetection::from_rect(0.0, 0.0, w as f32, h as f32, "HELLO")])
///     }
/// }
/// ```
pub trait RecognitionEngine: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Run detection and recognition over one page image on the given device.
    ///
    /// Called from a blocking thread; implementations may block freely.
    ///
    /// # Errors
    ///
    /// Should return `PagelaneError::Recognition` when inference fails.
    fn recognize(&self, image: &RgbImage, device_id: usize) -> Result<Vec<RawDetection>>;

    /// Whether one instance may be entered from several threads at once.
    fn is_concurrency_safe(&self) -> bool {
        true
    }
}

/// Builds one engine per device slot.
pub trait EngineFactory: Send + Sync {
    /// Create the engine bound to `device_id`.
    fn create(&self, device_id: usize) -> Result<Arc<dyn RecognitionEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(usize) -> Result<Arc<dyn RecognitionEngine>> + Send + Sync,
{
    fn create(&self, device_id: usize) -> Result<Arc<dyn RecognitionEngine>> {
        self(device_id)
    }
}

/// How engines are handed to device slots.
#[derive(Clone)]
pub enum EngineProvisioning {
    /// One engine shared by every device slot.
    Shared(Arc<dyn RecognitionEngine>),
    /// A fresh engine per device slot, built at the start of each dispatch call.
    PerDevice(Arc<dyn EngineFactory>),
}

impl fmt::Debug for EngineProvisioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(engine) => f.debug_tuple("Shared").field(&engine.name()).finish(),
            Self::PerDevice(_) => f.write_str("PerDevice(..)"),
        }
    }
}

impl EngineProvisioning {
    pub fn shared(engine: impl RecognitionEngine + 'static) -> Self {
        Self::Shared(Arc::new(engine))
    }

    pub fn per_device(factory: impl EngineFactory + 'static) -> Self {
        Self::PerDevice(Arc::new(factory))
    }

    /// Materialize the engines for `device_count` slots.
    ///
    /// # Errors
    ///
    /// - `PagelaneError::Validation` if a shared engine is not safe for
    ///   concurrent calls and more than one device is in use
    /// - whatever the factory returns when building a per-device engine fails
    pub fn provision(&self, device_count: usize) -> Result<EngineSet> {
        let device_count = device_count.max(1);

        match self {
            Self::Shared(engine) => {
                if device_count > 1 && !engine.is_concurrency_safe() {
                    return Err(PagelaneError::validation(format!(
                        "Engine '{}' is not safe for concurrent calls; provision it per device to use {} devices",
                        engine.name(),
                        device_count
                    )));
                }
                Ok(EngineSet {
                    engines: vec![Arc::clone(engine); device_count],
                })
            }
            Self::PerDevice(factory) => {
                let engines = (0..device_count)
                    .map(|device_id| factory.create(device_id))
                    .collect::<Result<Vec<_>>>()?;
                Ok(EngineSet { engines })
            }
        }
    }
}

/// Engines resolved for one dispatch call, indexed by device id.
#[derive(Clone)]
pub struct EngineSet {
    engines: Vec<Arc<dyn RecognitionEngine>>,
}

impl EngineSet {
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Engine bound to `device_id`.
    ///
    /// # Errors
    ///
    /// Returns `PagelaneError::Validation` for an unknown device id.
    pub fn for_device(&self, device_id: usize) -> Result<Arc<dyn RecognitionEngine>> {
        self.engines.get(device_id).cloned().ok_or_else(|| {
            PagelaneError::validation(format!(
                "No engine provisioned for device {} ({} available)",
                device_id,
                self.engines.len()
            ))
        })
    }
}
