//! Daemon configuration.
//!
//! One JSON document aggregates every component's config plus an optional
//! seed inventory. Missing sections fall back to their defaults.

use anyhow::Context;
use corridor_attest::AttestConfig;
use corridor_calibrate::CalibrationConfig;
use corridor_core::DeviceId;
use corridor_inventory::Device;
use corridor_lifecycle::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Known-good measurements for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSeed {
    /// Device
    pub device_id: DeviceId,
    /// SHA-256 of the firmware image
    pub firmware_hash: String,
    /// SHA-256 of the device configuration
    pub config_hash: String,
}

/// Daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Attestation verifier
    pub attest: AttestConfig,
    /// Calibration engine
    pub calibration: CalibrationConfig,
    /// Lifecycle supervisor
    pub supervisor: SupervisorConfig,
    /// Devices provisioned at startup
    pub devices: Vec<Device>,
    /// Baselines registered at startup
    pub baselines: Vec<BaselineSeed>,
}

impl FabricConfig {
    /// Create a new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a seed device
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    /// Add a seed baseline
    #[must_use]
    pub fn with_baseline(mut self, seed: BaselineSeed) -> Self {
        self.baselines.push(seed);
        self
    }

    /// Set the supervisor config
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid config
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load from an optional path; no path means defaults
    ///
    /// # Errors
    ///
    /// Same as [`FabricConfig::from_file`]
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Short content hash, logged at startup to tell deployments apart
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&canonical).to_hex()[..16].to_string()
    }
}
