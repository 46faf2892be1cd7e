//! Fabric inventory store.
//!
//! Devices, paths and policies live in independent keyed maps, each behind
//! its own reader-writer lock. There is no cascading cleanup: deleting a
//! policy leaves its target alone, and devices are never removed, only
//! disabled.

use crate::device::Device;
use crate::path::{FabricPath, PathRequest};
use crate::policy::{Policy, PolicyMatch, PolicyRequest};
use crate::probe::{DeviceProbe, NullProbe};
use corridor_core::{
    DeviceClass, DeviceId, DeviceStatus, FabricError, FabricResult, PathId, PathType, SharedClock,
};
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Status change applied by [`FabricInventory::set_device_status`]
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// Device after the change
    pub device: Device,
    /// Status before the change
    pub previous: DeviceStatus,
}

impl StatusChange {
    /// Whether the device just went from usable to disabled
    #[must_use]
    pub fn dropped(&self) -> bool {
        self.previous != DeviceStatus::Disabled && self.device.status == DeviceStatus::Disabled
    }
}

/// Fabric inventory
pub struct FabricInventory {
    devices: Arc<RwLock<IndexMap<DeviceId, Device>>>,
    paths: Arc<RwLock<IndexMap<PathId, FabricPath>>>,
    policies: Arc<RwLock<IndexMap<String, Policy>>>,
    next_path: AtomicU64,
    probe: Arc<dyn DeviceProbe>,
    clock: SharedClock,
}

impl FabricInventory {
    /// Empty inventory that never re-enumerates dropped devices
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self::with_probe(clock, Arc::new(NullProbe))
    }

    /// Empty inventory with a re-enumeration probe
    #[must_use]
    pub fn with_probe(clock: SharedClock, probe: Arc<dyn DeviceProbe>) -> Self {
        Self {
            devices: Arc::new(RwLock::new(IndexMap::new())),
            paths: Arc::new(RwLock::new(IndexMap::new())),
            policies: Arc::new(RwLock::new(IndexMap::new())),
            next_path: AtomicU64::new(1),
            probe,
            clock,
        }
    }

    /// Insert or refresh a device; stamps `last_seen`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a corridor-class device has fewer
    /// wavelengths than lanes or a memory-class device has no tier
    pub async fn register_device(&self, mut device: Device) -> FabricResult<Device> {
        match device.class {
            DeviceClass::Corridor if (device.wavelengths_nm.len() as u64) < u64::from(device.lanes) => {
                return Err(FabricError::invalid(
                    "wavelengths_nm",
                    format!(
                        "{} has {} lanes but only {} wavelengths",
                        device.id,
                        device.lanes,
                        device.wavelengths_nm.len()
                    ),
                ));
            }
            DeviceClass::Memory if device.tier.is_none() => {
                return Err(FabricError::invalid("tier", format!("{} has no latency tier", device.id)));
            }
            _ => {}
        }

        device.last_seen = self.clock.now();
        let mut devices = self.devices.write().await;
        let refreshed = devices.insert(device.id.clone(), device.clone()).is_some();
        debug!(device = %device.id, class = %device.class, refreshed, "device registered");
        Ok(device)
    }

    /// All devices, in registration order
    pub async fn list_devices(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    /// One device
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id
    pub async fn get_device(&self, id: &DeviceId) -> FabricResult<Device> {
        self.devices
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| FabricError::not_found("device", id))
    }

    /// Set a device's status from its wire name
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `status` is `active`, `maintenance`
    /// or `disabled`; `NotFound` for an unknown id
    pub async fn set_device_state(&self, id: &DeviceId, status: &str) -> FabricResult<StatusChange> {
        let status: DeviceStatus = status.parse()?;
        self.set_device_status(id, status).await
    }

    /// Set a device's status
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id
    pub async fn set_device_status(&self, id: &DeviceId, status: DeviceStatus) -> FabricResult<StatusChange> {
        let now = self.clock.now();
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(id)
            .ok_or_else(|| FabricError::not_found("device", id))?;
        let previous = device.status;
        device.status = status;
        device.last_seen = now;

        if status == DeviceStatus::Disabled && previous != status {
            warn!(device = %id, from = %previous, "device marked unavailable");
        } else {
            info!(device = %id, from = %previous, to = %status, "device status changed");
        }
        Ok(StatusChange {
            device: device.clone(),
            previous,
        })
    }

    /// Probe a disabled device and reactivate it if it answers
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id
    pub async fn reenumerate(&self, id: &DeviceId) -> FabricResult<bool> {
        let device = self.get_device(id).await?;
        if device.status != DeviceStatus::Disabled {
            return Ok(true);
        }
        if self.probe.is_present(id) {
            info!(device = %id, "device re-enumerated");
            self.set_device_status(id, DeviceStatus::Active).await?;
            Ok(true)
        } else {
            warn!(device = %id, "re-enumeration found no device");
            Ok(false)
        }
    }

    /// Create a path between two known devices
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if either device is unknown and `InvalidArgument`
    /// if the path type is not `PBR`, `GIM` or `Direct`
    pub async fn create_path(&self, request: PathRequest) -> FabricResult<FabricPath> {
        {
            let devices = self.devices.read().await;
            for (role, id) in [("source device", &request.source_device), ("target device", &request.target_device)] {
                if !devices.contains_key(id) {
                    return Err(FabricError::not_found(role, id));
                }
            }
        }
        let path_type: PathType = request.path_type.parse()?;

        let id = PathId::sequential(self.next_path.fetch_add(1, Ordering::SeqCst));
        let path = FabricPath {
            id: id.clone(),
            source_device: request.source_device,
            target_device: request.target_device,
            path_type,
            bandwidth_gbps: request.bandwidth_gbps,
            latency_ns: request.latency_ns,
            qos: request.qos,
            status: DeviceStatus::Active,
            created_at: self.clock.now(),
        };
        info!(
            path = %id,
            source = %path.source_device,
            target = %path.target_device,
            kind = %path_type,
            "path created"
        );
        self.paths.write().await.insert(id, path.clone());
        Ok(path)
    }

    /// All paths, in creation order
    pub async fn list_paths(&self) -> Vec<FabricPath> {
        self.paths.read().await.values().cloned().collect()
    }

    /// One path
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id
    pub async fn get_path(&self, id: &PathId) -> FabricResult<FabricPath> {
        self.paths
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| FabricError::not_found("path", id))
    }

    /// Insert or replace a policy and apply it best-effort.
    ///
    /// An enabled path policy overwrites the path's QoS; an enabled device
    /// policy refreshes the device's `last_seen`. Missing targets are
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty name or bad `match`
    pub async fn add_policy(&self, request: PolicyRequest) -> FabricResult<Policy> {
        let now = self.clock.now();
        let policy = request.validate(now)?;

        if policy.enabled {
            let applied = match policy.target {
                PolicyMatch::Path => {
                    let mut paths = self.paths.write().await;
                    match paths.get_mut(&PathId::new(policy.target_id.as_str())) {
                        Some(path) => {
                            path.qos = policy.qos.clone();
                            true
                        }
                        None => false,
                    }
                }
                PolicyMatch::Device => {
                    let mut devices = self.devices.write().await;
                    match devices.get_mut(&DeviceId::new(policy.target_id.as_str())) {
                        Some(device) => {
                            device.last_seen = now;
                            true
                        }
                        None => false,
                    }
                }
            };
            if !applied {
                debug!(policy = %policy.name, target = %policy.target_id, "policy target absent, stored only");
            }
        }

        info!(policy = %policy.name, target = %policy.target_id, enabled = policy.enabled, "policy stored");
        self.policies
            .write()
            .await
            .insert(policy.name.clone(), policy.clone());
        Ok(policy)
    }

    /// All policies, in insertion order
    pub async fn list_policies(&self) -> Vec<Policy> {
        self.policies.read().await.values().cloned().collect()
    }

    /// Delete a policy; its target is untouched
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown name
    pub async fn delete_policy(&self, name: &str) -> FabricResult<()> {
        match self.policies.write().await.shift_remove(name) {
            Some(_) => {
                info!(policy = %name, "policy deleted");
                Ok(())
            }
            None => Err(FabricError::not_found("policy", name)),
        }
    }
}

impl std::fmt::Debug for FabricInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricInventory").finish_non_exhaustive()
    }
}
