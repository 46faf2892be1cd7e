//! Shared handler state.

use crate::config::FabricConfig;
use corridor_alloc::Allocator;
use corridor_attest::{AttestationVerifier, Baseline};
use corridor_calibrate::CalibrationEngine;
use corridor_core::{Clock, FabricResult, SharedClock, Timestamp};
use corridor_inventory::FabricInventory;
use corridor_lifecycle::Supervisor;
use std::sync::Arc;
use tracing::info;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle supervisor; owns every other component
    pub supervisor: Supervisor,
    /// Clock shared with every component
    pub clock: SharedClock,
    /// When the daemon came up
    pub started_at: Timestamp,
    /// Fingerprint of the loaded config
    pub fingerprint: String,
}

impl AppState {
    /// Wrap an existing supervisor
    #[must_use]
    pub fn new(supervisor: Supervisor, clock: SharedClock) -> Self {
        let started_at = clock.now();
        Self {
            supervisor,
            clock,
            started_at,
            fingerprint: String::new(),
        }
    }

    /// Build every component from config and provision the seed inventory
    ///
    /// # Errors
    ///
    /// Fails on a bad signing key, a malformed seed device or a malformed
    /// baseline digest
    pub async fn build(config: FabricConfig, clock: SharedClock) -> FabricResult<Self> {
        let fingerprint = config.fingerprint();
        let inventory = Arc::new(FabricInventory::new(clock.clone()));
        let verifier = Arc::new(AttestationVerifier::new(config.attest, clock.clone())?);
        let engine = CalibrationEngine::new(config.calibration);
        let started_at = clock.now();
        let supervisor = Supervisor::new(
            config.supervisor,
            inventory,
            Allocator::new(),
            verifier,
            engine,
            clock.clone(),
        );

        for device in config.devices {
            supervisor.provision_device(device).await?;
        }
        for seed in config.baselines {
            let baseline = Baseline::new(seed.firmware_hash, seed.config_hash)?;
            supervisor.verifier().register_baseline(seed.device_id, baseline).await;
        }
        info!(
            devices = supervisor.inventory().list_devices().await.len(),
            %fingerprint,
            "fabric state built"
        );

        Ok(Self {
            supervisor,
            clock,
            started_at,
            fingerprint,
        })
    }
}
