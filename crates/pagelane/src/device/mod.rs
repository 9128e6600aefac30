//! Accelerator device discovery and slot management.
//!
//! The dispatcher asks a [`DeviceProbe`] for the number of accelerator
//! devices once per dispatch call. Probe failures never abort a dispatch:
//! [`resolve_device_count`] logs them and falls back to a single device,
//! which selects the sequential execution path.

pub mod pool;

pub use pool::{DeviceSlot, DeviceSlotPool};

use crate::{PagelaneError, Result};

/// Explicit device count override read by [`EnvDeviceProbe`].
pub const DEVICE_COUNT_ENV: &str = "PAGELANE_DEVICE_COUNT";

/// Visible CUDA device list read by [`EnvDeviceProbe`].
pub const CUDA_VISIBLE_DEVICES_ENV: &str = "CUDA_VISIBLE_DEVICES";

/// Source of the accelerator device count.
pub trait DeviceProbe: Send + Sync {
    /// Number of accelerator devices available for recognition work.
    ///
    /// `0` means no accelerator was found.
    ///
    /// # Errors
    ///
    /// Returns `PagelaneError::DeviceEnumeration` when the count cannot be determined.
    fn device_count(&self) -> Result<usize>;
}

/// Reads the device count from the process environment.
///
/// `PAGELANE_DEVICE_COUNT` wins when set; otherwise the entries of
/// `CUDA_VISIBLE_DEVICES` are counted. With neither variable set the probe
/// reports no devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvDeviceProbe;

impl DeviceProbe for EnvDeviceProbe {
    fn device_count(&self) -> Result<usize> {
        let explicit = std::env::var(DEVICE_COUNT_ENV).ok();
        let visible = std::env::var(CUDA_VISIBLE_DEVICES_ENV).ok();
        count_from_env_values(explicit.as_deref(), visible.as_deref())
    }
}

/// Reports a fixed device count.
#[derive(Debug, Clone, Copy)]
pub struct FixedDeviceProbe(pub usize);

impl DeviceProbe for FixedDeviceProbe {
    fn device_count(&self) -> Result<usize> {
        Ok(self.0)
    }
}

fn count_from_env_values(explicit: Option<&str>, visible: Option<&str>) -> Result<usize> {
    if let Some(raw) = explicit {
        return raw.trim().parse::<usize>().map_err(|e| {
            PagelaneError::device_enumeration_with_source(
                format!("{} is not a device count: {:?}", DEVICE_COUNT_ENV, raw),
                e,
            )
        });
    }

    match visible {
        Some(raw) => parse_visible_devices(raw),
        None => Ok(0),
    }
}

/// Count the devices listed in a `CUDA_VISIBLE_DEVICES` value.
///
/// Entries are either integer ordinals or `GPU-`/`MIG-` UUIDs. CUDA stops
/// enumerating at the first negative ordinal, so `-1` hides everything.
pub fn parse_visible_devices(raw: &str) -> Result<usize> {
    let mut count = 0;

    for entry in raw.split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        if entry.starts_with("GPU-") || entry.starts_with("MIG-") {
            count += 1;
            continue;
        }
        match entry.parse::<i64>() {
            Ok(ordinal) if ordinal < 0 => break,
            Ok(_) => count += 1,
            Err(e) => {
                return Err(PagelaneError::device_enumeration_with_source(
                    format!("Malformed {} entry {:?}", CUDA_VISIBLE_DEVICES_ENV, entry),
                    e,
                ));
            }
        }
    }

    Ok(count)
}

/// Resolve the effective device count for one dispatch call.
///
/// Returns `max(probed, 1)`. Probe errors are logged and treated as a single device.
pub fn resolve_device_count(probe: &dyn DeviceProbe) -> usize {
    match probe.device_count() {
        Ok(count) => count.max(1),
        Err(e) => {
            tracing::warn!("Device enumeration failed, falling back to sequential execution: {}", e);
            1
        }
    }
}

/// Device slot for the job at `index`.
pub fn device_for_index(index: usize, device_count: usize) -> usize {
    if device_count > 1 { index % device_count } else { 0 }
}
