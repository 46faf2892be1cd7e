//! Device re-enumeration.

use corridor_core::DeviceId;
use std::collections::HashSet;
use std::sync::RwLock;

/// Re-enumeration hook consulted after a device drops
pub trait DeviceProbe: Send + Sync {
    /// Whether the device answers enumeration
    fn is_present(&self, device: &DeviceId) -> bool;
}

/// Probe that never finds a dropped device again
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl DeviceProbe for NullProbe {
    fn is_present(&self, _device: &DeviceId) -> bool {
        false
    }
}

/// Probe backed by a mutable set of present devices
#[derive(Debug, Default)]
pub struct StaticProbe {
    present: RwLock<HashSet<DeviceId>>,
}

impl StaticProbe {
    /// Probe answering for the given devices
    #[must_use]
    pub fn new(present: impl IntoIterator<Item = DeviceId>) -> Self {
        Self {
            present: RwLock::new(present.into_iter().collect()),
        }
    }

    /// Device (re)appears
    pub fn plug(&self, device: DeviceId) {
        if let Ok(mut set) = self.present.write() {
            set.insert(device);
        }
    }

    /// Device disappears
    pub fn unplug(&self, device: &DeviceId) {
        if let Ok(mut set) = self.present.write() {
            set.remove(device);
        }
    }
}

impl DeviceProbe for StaticProbe {
    fn is_present(&self, device: &DeviceId) -> bool {
        self.present
            .read()
            .map(|set| set.contains(device))
            .unwrap_or(false)
    }
}
