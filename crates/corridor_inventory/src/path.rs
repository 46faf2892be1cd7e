//! Fabric paths and QoS.

use corridor_core::{DeviceId, DeviceStatus, PathId, PathType, Priority, Timestamp};
use serde::{Deserialize, Serialize};

/// Quality of service parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QosConfig {
    /// Priority class
    pub priority: Priority,
    /// Minimum bandwidth
    pub min_bandwidth_gbps: u64,
    /// Maximum latency
    pub max_latency_ns: u64,
    /// Priority flow control
    pub pfc: bool,
    /// Explicit congestion notification
    pub ecn: bool,
}

/// Path creation request; the path type is validated on creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequest {
    /// Source device
    pub source_device: DeviceId,
    /// Target device
    pub target_device: DeviceId,
    /// `PBR`, `GIM` or `Direct`
    pub path_type: String,
    /// Provisioned bandwidth
    #[serde(default)]
    pub bandwidth_gbps: u64,
    /// Path latency
    #[serde(default)]
    pub latency_ns: u64,
    /// QoS
    #[serde(default)]
    pub qos: QosConfig,
}

/// Path between two devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricPath {
    /// Path identifier
    pub id: PathId,
    /// Source device
    pub source_device: DeviceId,
    /// Target device
    pub target_device: DeviceId,
    /// Path kind
    pub path_type: PathType,
    /// Provisioned bandwidth
    pub bandwidth_gbps: u64,
    /// Path latency
    pub latency_ns: u64,
    /// QoS, overwritten by enabled path policies
    pub qos: QosConfig,
    /// Operational status
    pub status: DeviceStatus,
    /// Creation time
    pub created_at: Timestamp,
}

impl FabricPath {
    /// Whether the path touches `device`
    #[must_use]
    pub fn touches(&self, device: &DeviceId) -> bool {
        &self.source_device == device || &self.target_device == device
    }
}
