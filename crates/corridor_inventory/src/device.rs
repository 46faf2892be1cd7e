//! Fabric devices.

use corridor_core::{DeviceClass, DeviceId, DeviceStatus, LatencyClass, Timestamp};
use serde::{Deserialize, Serialize};

/// First wavelength of the default corridor grid
pub const GRID_START_NM: u32 = 1550;

/// Physical or virtual fabric endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier
    pub id: DeviceId,
    /// Device class
    pub class: DeviceClass,
    /// Lane capacity (corridor-class)
    #[serde(default)]
    pub lanes: u32,
    /// Wavelength grid; entries beyond `lanes` are spares (corridor-class)
    #[serde(default)]
    pub wavelengths_nm: Vec<u32>,
    /// Byte capacity (memory-class)
    #[serde(default)]
    pub capacity_bytes: u64,
    /// Native bandwidth: Gbps for corridor-class, GB/s for memory-class
    pub bandwidth: u64,
    /// Access latency
    #[serde(default)]
    pub latency_ns: u64,
    /// Latency tier (memory-class)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<LatencyClass>,
    /// Firmware version string
    #[serde(default)]
    pub firmware_version: String,
    /// Operational status
    #[serde(default = "default_status")]
    pub status: DeviceStatus,
    /// Last refresh or state change
    #[serde(default)]
    pub last_seen: Timestamp,
}

fn default_status() -> DeviceStatus {
    DeviceStatus::Active
}

impl Device {
    /// Corridor-class device with `lanes` lanes on the default grid
    #[must_use]
    pub fn corridor(id: impl Into<DeviceId>, lanes: u32, bandwidth_gbps: u64) -> Self {
        Self {
            id: id.into(),
            class: DeviceClass::Corridor,
            lanes,
            wavelengths_nm: (GRID_START_NM..GRID_START_NM + lanes).collect(),
            capacity_bytes: 0,
            bandwidth: bandwidth_gbps,
            latency_ns: 0,
            tier: None,
            firmware_version: String::new(),
            status: DeviceStatus::Active,
            last_seen: Timestamp::EPOCH,
        }
    }

    /// Memory-class device in a latency tier
    #[must_use]
    pub fn memory(
        id: impl Into<DeviceId>,
        capacity_bytes: u64,
        bandwidth_gbs: u64,
        tier: LatencyClass,
    ) -> Self {
        Self {
            id: id.into(),
            class: DeviceClass::Memory,
            lanes: 0,
            wavelengths_nm: Vec::new(),
            capacity_bytes,
            bandwidth: bandwidth_gbs,
            latency_ns: 0,
            tier: Some(tier),
            firmware_version: String::new(),
            status: DeviceStatus::Active,
            last_seen: Timestamp::EPOCH,
        }
    }

    /// Replace the wavelength grid
    #[must_use]
    pub fn with_wavelengths(mut self, grid: Vec<u32>) -> Self {
        self.wavelengths_nm = grid;
        self
    }

    /// Add `count` spare wavelengths after the end of the grid
    #[must_use]
    pub fn with_spares(mut self, count: u32) -> Self {
        let next = self.wavelengths_nm.iter().max().map_or(GRID_START_NM, |w| w + 1);
        self.wavelengths_nm.extend(next..next + count);
        self
    }

    /// Set latency
    #[must_use]
    pub fn with_latency(mut self, latency_ns: u64) -> Self {
        self.latency_ns = latency_ns;
        self
    }

    /// Set firmware version
    #[must_use]
    pub fn with_firmware(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = version.into();
        self
    }

    /// Set status
    #[must_use]
    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether new grants may land here
    #[must_use]
    pub fn is_admissible(&self) -> bool {
        self.status.accepts_admission()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corridor_default_grid() {
        let dev = Device::corridor("corridor-001", 8, 500);
        assert_eq!(dev.wavelengths_nm, (1550..=1557).collect::<Vec<_>>());
        assert!(dev.is_admissible());
    }

    #[test]
    fn test_spares_extend_grid() {
        let dev = Device::corridor("corridor-001", 4, 200).with_spares(2);
        assert_eq!(dev.wavelengths_nm, vec![1550, 1551, 1552, 1553, 1554, 1555]);
        assert_eq!(dev.lanes, 4);
    }

    #[test]
    fn test_memory_device_json() {
        let dev = Device::memory("cxl-dev-001", 1 << 40, 100, LatencyClass::T2);
        let json = serde_json::to_value(&dev).unwrap();
        assert_eq!(json["class"], "memory-class");
        assert_eq!(json["tier"], "T2");
        assert_eq!(json["status"], "active");

        let minimal: Device = serde_json::from_str(
            r#"{"id":"m","class":"memory-class","capacity_bytes":10,"bandwidth":5,"tier":"T0"}"#,
        )
        .unwrap();
        assert_eq!(minimal.status, DeviceStatus::Active);
    }
}
