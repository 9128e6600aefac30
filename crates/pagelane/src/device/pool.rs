//! Per-device capacity limiters.

use crate::{PagelaneError, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed set of execution slots, one per device, each admitting one job at a time.
///
/// Built once per dispatch call and only when more than one device is available.
#[derive(Debug)]
pub struct DeviceSlotPool {
    slots: Vec<Arc<Semaphore>>,
}

/// Exclusive hold on a device slot.
///
/// The slot is released when the guard is dropped, including during unwinding.
#[derive(Debug)]
pub struct DeviceSlot {
    device_id: usize,
    _permit: OwnedSemaphorePermit,
}

impl DeviceSlot {
    pub fn device_id(&self) -> usize {
        self.device_id
    }
}

impl DeviceSlotPool {
    /// Build one capacity-1 slot per device id in `[0, device_count)`.
    pub fn new(device_count: usize) -> Self {
        let slots = (0..device_count).map(|_| Arc::new(Semaphore::new(1))).collect();
        Self { slots }
    }

    pub fn device_count(&self) -> usize {
        self.slots.len()
    }

    /// Wait until the slot for `device_id` is free and take it.
    ///
    /// # Errors
    ///
    /// Returns `PagelaneError::Validation` for a device id outside the pool.
    pub async fn acquire(&self, device_id: usize) -> Result<DeviceSlot> {
        let slot = self.slots.get(device_id).ok_or_else(|| {
            PagelaneError::validation(format!(
                "Device {} is out of range for a pool of {} devices",
                device_id,
                self.slots.len()
            ))
        })?;

        let permit = Arc::clone(slot)
            .acquire_owned()
            .await
            .map_err(|e| PagelaneError::Other(format!("Device {} slot closed: {}", device_id, e)))?;

        Ok(DeviceSlot {
            device_id,
            _permit: permit,
        })
    }

    /// Whether the slot for `device_id` is currently free.
    pub fn is_free(&self, device_id: usize) -> bool {
        self.slots
            .get(device_id)
            .is_some_and(|slot| slot.available_permits() == 1)
    }
}
