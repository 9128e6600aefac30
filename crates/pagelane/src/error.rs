//! Error types for pagelane.
//!
//! Every fallible operation returns [`PagelaneError`]. Variants fall into two
//! groups that matter to the dispatcher:
//!
//! **Call-level errors** abort a whole dispatch call:
//! - `InputMaterialization` - the job source could not decode or enumerate its input
//! - `Validation` - invalid configuration, unknown device id, engine provisioning mismatch
//! - `UnsupportedFormat` - the input file type is not accepted
//! - `Io` - raw system I/O errors outside of a worker (these always bubble up)
//!
//! **Per-job errors** are recorded against a single page and never stop sibling jobs:
//! - `Recognition` - the engine failed (or the worker panicked) for one page
//! - `Persistence` - writing the overlay image or the sidecar text failed
//! - `ImageProcessing` - converting or encoding a page image failed
//!
//! `DeviceEnumeration` is produced by device probes but never escapes a dispatch
//! call: the dispatcher falls back to sequential execution instead.
//!
//! # Example
//!
//! ```rust
//! use pagelane::{PagelaneError, Result};
//!
//! fn read_sidecar(path: &str) -> Result<String> {
//!     let content = std::fs::read_to_string(path)
//!         .map_err(|e| PagelaneError::persistence_with_source(format!("Failed to read {}", path), e))?;
//!
//!     if content.is_empty() {
//!         return Err(PagelaneError::validation(format!("Sidecar is empty: {}", path)));
//!     }
//!
//!     Ok(content)
//! }
//! ```
use thiserror::Error;

/// Result type alias using `PagelaneError`.
pub type Result<T> = std::result::Result<T, PagelaneError>;

/// Main error type for all pagelane operations.
#[derive(Debug, Error)]
pub enum PagelaneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input materialization error: {message}")]
    InputMaterialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Device enumeration error: {message}")]
    DeviceEnumeration {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Recognition error: {message}")]
    Recognition {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Image processing error: {message}")]
    ImageProcessing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Other(String),
}

impl PagelaneError {
    /// Whether this error is confined to a single job.
    ///
    /// Per-job errors are turned into error markers in the final collection;
    /// everything else aborts the dispatch call.
    pub fn is_job_scoped(&self) -> bool {
        matches!(
            self,
            Self::Recognition { .. } | Self::Persistence { .. } | Self::ImageProcessing { .. }
        )
    }

    /// Short variant name used in error metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "Io",
            Self::InputMaterialization { .. } => "InputMaterialization",
            Self::DeviceEnumeration { .. } => "DeviceEnumeration",
            Self::Recognition { .. } => "Recognition",
            Self::Persistence { .. } => "Persistence",
            Self::Validation { .. } => "Validation",
            Self::ImageProcessing { .. } => "ImageProcessing",
            Self::Serialization { .. } => "Serialization",
            Self::UnsupportedFormat(_) => "UnsupportedFormat",
            Self::Other(_) => "Other",
        }
    }
}

impl From<serde_json::Error> for PagelaneError {
    fn from(err: serde_json::Error) -> Self {
        PagelaneError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<image::ImageError> for PagelaneError {
    fn from(err: image::ImageError) -> Self {
        PagelaneError::ImageProcessing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl PagelaneError {
    error_constructor!(input_materialization, InputMaterialization);
    error_constructor!(device_enumeration, DeviceEnumeration);
    error_constructor!(recognition, Recognition);
    error_constructor!(persistence, Persistence);
    error_constructor!(validation, Validation);
    error_constructor!(image_processing, ImageProcessing);
    error_constructor!(serialization, Serialization);
}
