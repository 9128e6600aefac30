//! Configuration loading and management.
//!
//! Dispatch settings can be loaded from TOML, YAML or JSON files, discovered as
//! `pagelane.toml` in the project hierarchy, or built programmatically.

use crate::{PagelaneError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name searched for by [`DispatchConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "pagelane.toml";

/// Thickest box outline accepted by [`DispatchConfig::validate`], in pixels.
pub const MAX_LINE_WIDTH: u32 = 64;

/// Main dispatch configuration.
///
/// # Example
///
/// ```rust
/// use pagelane::core::config::DispatchConfig;
///
/// let config = DispatchConfig::default();
/// assert_eq!(config.spawn_stagger_ms, 100);
/// assert_eq!(config.overlay.quality, 95);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Delay between successive task spawns in concurrent mode, in milliseconds.
    ///
    /// Spreads out engine cold starts on the same device. `0` disables it.
    #[serde(default = "default_spawn_stagger_ms")]
    pub spawn_stagger_ms: u64,

    /// Device count override (None = ask the device probe)
    #[serde(default)]
    pub device_count: Option<usize>,

    /// Sort the final collection by page number instead of completion order
    #[serde(default)]
    pub sort_by_page: bool,

    /// Overlay rendering and persistence settings
    #[serde(default)]
    pub overlay: OverlayConfig,
}

/// Overlay rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// JPEG quality for overlay images (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Detections scoring below this threshold are not drawn
    #[serde(default = "default_draw_threshold")]
    pub draw_threshold: f32,

    /// Box outline thickness in pixels (1 to [`MAX_LINE_WIDTH`])
    #[serde(default = "default_line_width")]
    pub line_width: u32,
}

fn default_spawn_stagger_ms() -> u64 {
    100
}
fn default_quality() -> u8 {
    95
}
fn default_draw_threshold() -> f32 {
    1.0
}
fn default_line_width() -> u32 {
    4
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            spawn_stagger_ms: default_spawn_stagger_ms(),
            device_count: None,
            sort_by_page: false,
            overlay: OverlayConfig::default(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            draw_threshold: default_draw_threshold(),
            line_width: default_line_width(),
        }
    }
}

impl DispatchConfig {
    pub fn spawn_stagger(&self) -> Duration {
        Duration::from_millis(self.spawn_stagger_ms)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `PagelaneError::Validation` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.overlay.quality) {
            return Err(PagelaneError::validation(format!(
                "overlay.quality must be between 1 and 100, got {}",
                self.overlay.quality
            )));
        }
        if !self.overlay.draw_threshold.is_finite() || self.overlay.draw_threshold < 0.0 {
            return Err(PagelaneError::validation(format!(
                "overlay.draw_threshold must be a non-negative number, got {}",
                self.overlay.draw_threshold
            )));
        }
        if !(1..=MAX_LINE_WIDTH).contains(&self.overlay.line_width) {
            return Err(PagelaneError::validation(format!(
                "overlay.line_width must be between 1 and {}, got {}",
                MAX_LINE_WIDTH, self.overlay.line_width
            )));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `PagelaneError::Validation` if the file doesn't exist or is invalid TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| PagelaneError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;

        let config: Self = serde_yaml_ng::from_str(&content)
            .map_err(|e| PagelaneError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PagelaneError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, picking the parser from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("toml") => Self::from_toml_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(PagelaneError::validation(format!(
                "Unsupported config file extension: {}",
                path.display()
            ))),
        }
    }

    /// Discover configuration file in parent directories.
    ///
    /// Searches for `pagelane.toml` in current directory and parent directories.
    ///
    /// # Returns
    ///
    /// - `Some(config)` if found
    /// - `None` if no config file found
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(PagelaneError::Io)?;

        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| PagelaneError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}
