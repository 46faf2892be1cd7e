//! Failure policy.
//!
//! Telemetry samples and fabric events feed [`Supervisor::assess`], which
//! moves resources between Ready and Degraded. The periodic
//! [`Supervisor::reconcile`] pass then walks the Degraded set:
//!
//! - past the escalation timeout: red alert, then Failed
//! - healthy for the whole recovery window: back to Ready
//! - otherwise: a recovery attempt whenever the back-off delay has elapsed
//!
//! Lane loss and device drop are handled as they are reported.

use crate::events::EventKind;
use crate::resource::{BackoffState, CorridorSpec, Observation, Resource, ResourceSpec, ResourceState};
use crate::supervisor::{Entry, Supervisor, bundle_demands, holdings};
use corridor_alloc::{AdmissionRequest, Dimension, LaneLoss, PoolKey};
use corridor_calibrate::CalibrationRequest;
use corridor_core::{
    DeviceId, DeviceStatus, ErrorBody, FabricError, FabricResult, GrantId, LatencyClass, Phase,
    ResourceId, Timestamp,
};
use corridor_inventory::Device;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Resources that got a recovery attempt
    pub attempts: Vec<ResourceId>,
    /// Resources failed after the escalation timeout
    pub escalated: Vec<ResourceId>,
    /// Resources returned to Ready
    pub recovered: Vec<ResourceId>,
    /// Healthy resources kept Degraded by an expired ticket
    pub blocked: Vec<ResourceId>,
}

impl ReconcileReport {
    /// Nothing happened
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
            && self.escalated.is_empty()
            && self.recovered.is_empty()
            && self.blocked.is_empty()
    }
}

/// Fate of a resource that depended on a dropped device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DropOutcome {
    /// Moved to another memory-class device
    FailedOver {
        /// Resource
        resource: ResourceId,
        /// New device
        to: DeviceId,
        /// New tier
        tier: LatencyClass,
    },
    /// Could not continue
    Failed {
        /// Resource
        resource: ResourceId,
        /// Why
        error: ErrorBody,
    },
}

/// Result of a device state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    /// Device after the change
    pub device: Device,
    /// Status before the change
    pub previous: DeviceStatus,
    /// Resources moved or failed because the device dropped
    pub affected: Vec<DropOutcome>,
}

impl Supervisor {
    /// Re-evaluate health after a change and apply the matching action
    pub(crate) async fn assess(&self, resource: &mut Resource, now: Timestamp, cause: &str) {
        let ratio = self.inner.config.ber_drift_ratio;
        let healthy = resource.floor_met && resource.telemetry_healthy(ratio);
        match (resource.phase, healthy) {
            (Phase::Ready, false) => {
                let drifting = resource.corridor().is_some_and(|c| c.ber > c.target_ber * ratio);
                if drifting {
                    self.shed_best_effort(resource, now).await;
                }
                if let Err(err) = self.transition(resource, Phase::Degraded, cause).await {
                    warn!(resource = %resource.id, error = %err, "could not mark resource degraded");
                }
            }
            (Phase::Degraded, true) => {
                if resource.healthy_since.is_none() {
                    debug!(resource = %resource.id, "telemetry back within threshold");
                    resource.healthy_since = Some(now);
                }
            }
            (Phase::Degraded, false) => resource.healthy_since = None,
            _ => {}
        }
    }

    async fn shed_best_effort(&self, resource: &mut Resource, now: Timestamp) {
        let Some(state) = resource.corridor_mut() else { return };
        state.best_effort_share /= 2.0;
        state.surplus_enabled = false;
        let share = state.best_effort_share;
        warn!(resource = %resource.id, best_effort_share = share, "BER drift, shedding non-critical traffic");
        self.inner
            .journal
            .record(now, Some(&resource.id), EventKind::TrafficShed { best_effort_share: share })
            .await;
    }

    /// Feed a telemetry sample into the failure policy
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `InvalidArgument` for a
    /// resource that is not admitted or a malformed sample
    pub async fn observe(&self, id: &ResourceId, sample: Observation) -> FabricResult<Resource> {
        if sample.ber.is_some_and(|b| !b.is_finite() || b < 0.0) {
            return Err(FabricError::invalid("ber", "must be a non-negative number"));
        }
        let entry = self.entry(id).await?;
        let mut resource = entry.resource.lock().await;
        let now = self.now();
        let phase = resource.phase;
        match &mut resource.state {
            Some(ResourceState::Corridor(c)) => {
                if let Some(ber) = sample.ber {
                    c.ber = ber;
                }
                if let Some(margin) = sample.eye_margin {
                    c.eye_margin = margin;
                }
                if let Some(achieved) = sample.achieved {
                    c.achievable_gbps = achieved;
                }
                if let Some(t) = sample.temperature_c {
                    c.temperature_c = t;
                }
            }
            Some(ResourceState::MemoryBundle(b)) => {
                if let Some(achieved) = sample.achieved {
                    b.achieved_gbs = achieved;
                }
            }
            None => {
                return Err(FabricError::invalid(
                    "resource",
                    format!("{id} is {phase} and reports no telemetry"),
                ));
            }
        }
        resource.updated_at = now;
        self.assess(&mut resource, now, "telemetry out of threshold").await;
        Ok(resource.clone())
    }

    /// One pass of the recovery loop over every Degraded resource
    pub async fn reconcile(&self) -> ReconcileReport {
        let config = &self.inner.config;
        let mut report = ReconcileReport::default();
        for entry in self.entries().await {
            let mut resource = entry.resource.lock().await;
            if resource.phase != Phase::Degraded {
                continue;
            }
            let now = self.now();
            let id = resource.id.clone();

            let degraded_for = now.duration_since(resource.degraded_since.unwrap_or(now));
            if degraded_for >= config.escalation_timeout() {
                let degraded_for_ms = degraded_for.as_millis() as u64;
                error!(resource = %id, degraded_for_ms, "RED ALERT: degraded past escalation timeout");
                self.inner
                    .journal
                    .record(now, Some(&id), EventKind::RedAlert { degraded_for_ms })
                    .await;
                let err = FabricError::unavailable(&id, format!("degraded for {degraded_for_ms} ms"));
                self.fail(&mut resource, &err, "escalation timeout").await;
                report.escalated.push(id);
                continue;
            }

            let recovered = resource
                .healthy_since
                .is_some_and(|since| now.duration_since(since) >= config.recovery_window());
            if recovered {
                match self
                    .transition(&mut resource, Phase::Ready, "healthy for the recovery window")
                    .await
                {
                    Ok(()) => {
                        if let Some(c) = resource.corridor_mut() {
                            c.best_effort_share = 1.0;
                            c.surplus_enabled = true;
                        }
                        report.recovered.push(id);
                    }
                    Err(_) => report.blocked.push(id),
                }
                continue;
            }

            let Some(backoff) = resource.backoff else { continue };
            if now < backoff.next_at {
                continue;
            }
            let attempt = backoff.attempt + 1;
            let delay_ms = config.backoff.delay(backoff.attempt).as_millis() as u64;
            resource.backoff = Some(BackoffState {
                attempt,
                next_at: now.saturating_add(config.backoff.delay(attempt)),
            });
            warn!(resource = %id, attempt, delay_ms, "recovery attempt");
            self.inner
                .journal
                .record(now, Some(&id), EventKind::BackoffAttempt { attempt, delay_ms })
                .await;
            self.attempt_recovery(&mut resource, now).await;
            report.attempts.push(id);
        }
        if !report.is_empty() {
            debug!(
                attempts = report.attempts.len(),
                escalated = report.escalated.len(),
                recovered = report.recovered.len(),
                "reconcile pass"
            );
        }
        report
    }

    /// Re-request a short floor and recalibrate a drifting or regrown
    /// corridor
    async fn attempt_recovery(&self, resource: &mut Resource, now: Timestamp) {
        let mut lanes_added = false;
        if !resource.floor_met {
            match self.regrow_floor(resource).await {
                Ok(added) => lanes_added = added,
                Err(err) => debug!(resource = %resource.id, error = %err, "floor still short"),
            }
        }

        let ratio = self.inner.config.ber_drift_ratio;
        let drifting = resource
            .corridor()
            .filter(|c| c.lanes > 0 && (lanes_added || c.ber > c.target_ber * ratio))
            .map(|c| {
                CalibrationRequest::new(resource.id.as_str(), c.target_ber, c.ber)
                    .with_profile(self.inner.config.ambient_profile.clone())
                    .with_temperature(c.temperature_c)
                    .with_lambda_count(c.lanes as usize)
            });
        if let Some(request) = drifting {
            match self.inner.engine.calibrate(&request) {
                Ok(result) => {
                    if let Some(c) = resource.corridor_mut() {
                        c.ber = result.final_ber;
                        c.eye_margin = result.final_eye_margin;
                        c.calibration = Some(result.clone());
                    }
                    self.record_calibration(resource, &result, now).await;
                }
                Err(err) => warn!(resource = %resource.id, error = %err, "recalibration failed"),
            }
        }
        self.assess(resource, now, "recovery attempt").await;
    }

    /// Ask for the rest of a short grant; true when a corridor got lanes back
    async fn regrow_floor(&self, resource: &mut Resource) -> FabricResult<bool> {
        let (device, grant) = holdings(resource)?;
        if let ResourceSpec::Corridor(spec) = resource.spec.clone() {
            return self.regrow_lanes(resource, &device, &grant, &spec).await;
        }

        let resize = self
            .inner
            .allocator
            .resize(&grant, &PoolKey::new(device, Dimension::Bandwidth), resource.spec.floor(), false)
            .await?;
        if let Some(b) = resource.bundle_mut() {
            b.achieved_gbs = resize.granted;
        }
        resource.floor_met = resize.met;
        Ok(false)
    }

    /// Regrow a corridor's lane share toward its requested count, light the
    /// extra wavelengths and re-request the bandwidth floor they carry
    async fn regrow_lanes(
        &self,
        resource: &mut Resource,
        device: &DeviceId,
        grant: &GrantId,
        spec: &CorridorSpec,
    ) -> FabricResult<bool> {
        let Some(state) = resource.corridor() else {
            return Ok(false);
        };
        let held = state.lanes;
        let mut wavelengths = state.wavelengths_nm.clone();
        let shrunk_floor = state.effective_floor_gbps;

        let lane_pool = PoolKey::new(device.clone(), Dimension::Lanes);
        let lanes = self
            .inner
            .allocator
            .resize(grant, &lane_pool, u64::from(spec.lanes), false)
            .await?;
        let missing = (lanes.granted as usize).saturating_sub(held as usize);
        if missing > 0 {
            let added = self
                .inner
                .allocator
                .assign_wavelengths(device, grant, &spec.lambda_nm, missing)
                .await?;
            wavelengths.extend(added);
            wavelengths.sort_unstable();
        }
        let count = wavelengths.len() as u32;
        if u64::from(count) < lanes.granted {
            // Lost wavelengths left the grid short; hold only what is lit.
            self.inner
                .allocator
                .resize(grant, &lane_pool, u64::from(count), false)
                .await?;
        }

        let info = self.inner.inventory.get_device(device).await?;
        let achievable = self.achievable(count, &info);
        let floor = if count >= spec.lanes { spec.min_gbps } else { shrunk_floor };
        let bandwidth = self
            .inner
            .allocator
            .resize(grant, &PoolKey::new(device.clone(), Dimension::Bandwidth), floor, false)
            .await?;

        let grown = count > held;
        if let Some(c) = resource.corridor_mut() {
            c.lanes = count;
            c.wavelengths_nm = wavelengths;
            c.achievable_gbps = achievable;
            c.effective_floor_gbps = floor;
        }
        resource.floor_met = bandwidth.met && achievable >= floor;
        if grown {
            info!(
                resource = %resource.id,
                device = %device,
                from = held,
                lanes = count,
                achievable_gbps = achievable,
                floor_met = resource.floor_met,
                "corridor lanes regrown"
            );
        }
        Ok(grown)
    }

    /// Move a resource to Failed and return its pool shares
    pub(crate) async fn fail(&self, resource: &mut Resource, err: &FabricError, reason: &str) {
        if let Err(e) = self.transition(resource, Phase::Failed, reason).await {
            warn!(resource = %resource.id, error = %e, "could not fail resource");
            return;
        }
        if let Some(grant) = resource.grant.take() {
            self.inner.allocator.release(&grant).await;
        }
        resource.floor_met = false;
        resource.last_error = Some(ErrorBody::from(err));
    }

    /// Report a lost wavelength on a corridor-class device.
    ///
    /// The holder moves onto a spare when one is left. Otherwise it keeps
    /// running on one lane fewer with its floor lowered to what the
    /// remaining lanes carry; a corridor left with no lanes fails.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a device without a wavelength grid and
    /// `InvalidArgument` for a wavelength off the grid
    pub async fn report_wavelength_loss(&self, device: &DeviceId, nm: u32) -> FabricResult<LaneLoss> {
        let loss = self.inner.allocator.lose_wavelength(device, nm).await?;
        let grant = match &loss {
            LaneLoss::Idle => return Ok(loss),
            LaneLoss::Remapped { grant, .. } | LaneLoss::Shrunk { grant, .. } => grant.clone(),
        };
        let Some(entry) = self.entry_holding(&grant).await else {
            warn!(device = %device, grant = %grant, "lost wavelength held by unknown grant");
            return Ok(loss);
        };
        let mut resource = entry.resource.lock().await;
        let now = self.now();

        match &loss {
            LaneLoss::Idle => {}
            LaneLoss::Remapped { from, to, .. } => {
                if let Some(c) = resource.corridor_mut() {
                    for nm in c.wavelengths_nm.iter_mut().filter(|nm| **nm == *from) {
                        *nm = *to;
                    }
                }
                self.inner
                    .journal
                    .record(
                        now,
                        Some(&resource.id),
                        EventKind::WavelengthRemapped {
                            device: device.clone(),
                            from: *from,
                            to: *to,
                        },
                    )
                    .await;
            }
            LaneLoss::Shrunk { lost, lanes, .. } => {
                let lanes = *lanes as u32;
                let bandwidth = self
                    .inner
                    .inventory
                    .get_device(device)
                    .await
                    .map_or(u64::MAX, |d| d.bandwidth);
                let achievable = (u64::from(lanes) * self.inner.config.lane_rate_gbps).min(bandwidth);
                let floor = resource.spec.floor().min(achievable);
                if let Err(err) = self
                    .inner
                    .allocator
                    .resize(&grant, &PoolKey::new(device.clone(), Dimension::Bandwidth), floor, false)
                    .await
                {
                    warn!(resource = %resource.id, error = %err, "could not return bandwidth of lost lane");
                }
                if let Some(c) = resource.corridor_mut() {
                    c.lanes = lanes;
                    c.wavelengths_nm.retain(|nm| nm != lost);
                    c.achievable_gbps = achievable;
                    c.effective_floor_gbps = floor;
                }
                warn!(
                    resource = %resource.id,
                    device = %device,
                    lost = *lost,
                    lanes,
                    floor_gbps = floor,
                    "lane lost without spare, floor adjusted"
                );
                self.inner
                    .journal
                    .record(
                        now,
                        Some(&resource.id),
                        EventKind::LanesShrunk {
                            device: device.clone(),
                            lost: *lost,
                            lanes,
                            floor_gbps: floor,
                        },
                    )
                    .await;
                if lanes == 0 {
                    let err = FabricError::unavailable(&resource.id, "every lane lost");
                    self.fail(&mut resource, &err, "no lanes left").await;
                    return Ok(loss);
                }
            }
        }
        self.assess(&mut resource, now, "wavelength lost").await;
        Ok(loss)
    }

    async fn entry_holding(&self, grant: &GrantId) -> Option<Arc<Entry>> {
        for entry in self.entries().await {
            if entry.resource.lock().await.grant.as_ref() == Some(grant) {
                return Some(entry);
            }
        }
        None
    }

    /// Change a device's status; a drop moves or fails its dependents
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown device and `InvalidArgument` for an
    /// unknown status
    pub async fn set_device_state(&self, device: &DeviceId, status: &str) -> FabricResult<DeviceReport> {
        let change = self.inner.inventory.set_device_state(device, status).await?;
        let affected = if change.dropped() {
            self.handle_device_drop(device).await
        } else {
            Vec::new()
        };
        let current = self.inner.inventory.get_device(device).await?;
        Ok(DeviceReport {
            device: current,
            previous: change.previous,
            affected,
        })
    }

    async fn handle_device_drop(&self, device: &DeviceId) -> Vec<DropOutcome> {
        let now = self.now();
        warn!(device = %device, "device dropped");
        self.inner
            .journal
            .record(now, None, EventKind::DeviceDropped { device: device.clone() })
            .await;

        match self.inner.inventory.reenumerate(device).await {
            Ok(true) => {
                info!(device = %device, "device came back on re-enumeration");
                self.inner
                    .journal
                    .record(self.now(), None, EventKind::DeviceRecovered { device: device.clone() })
                    .await;
                return Vec::new();
            }
            Ok(false) => {}
            Err(err) => warn!(device = %device, error = %err, "re-enumeration failed"),
        }

        let mut outcomes = Vec::new();
        for entry in self.entries().await {
            let mut resource = entry.resource.lock().await;
            if !resource.phase.is_live() || !resource.references(device) {
                continue;
            }
            let id = resource.id.clone();
            let movable = self.inner.config.failover
                && resource.phase.holds_shares()
                && matches!(resource.spec, ResourceSpec::MemoryBundle(_));

            let failed_over = if movable {
                self.fail_over(&mut resource, device).await
            } else {
                Err(FabricError::unavailable(device, "device dropped"))
            };
            match failed_over {
                Ok((to, tier)) => outcomes.push(DropOutcome::FailedOver { resource: id, to, tier }),
                Err(err) => {
                    self.fail(&mut resource, &err, "device dropped").await;
                    outcomes.push(DropOutcome::Failed {
                        resource: id,
                        error: ErrorBody::from(&err),
                    });
                }
            }
        }
        outcomes
    }

    /// Re-home a bundle on the nearest surviving tier
    async fn fail_over(&self, resource: &mut Resource, dropped: &DeviceId) -> FabricResult<(DeviceId, LatencyClass)> {
        let ResourceSpec::MemoryBundle(spec) = resource.spec.clone() else {
            return Err(FabricError::invalid("resource", "only memory bundles fail over"));
        };
        let tier = resource.bundle().map_or(spec.latency_class, |b| b.latency_class);
        let target = self.pick_memory_device(tier, Some(dropped), true).await?;
        let target_tier = target.tier.unwrap_or(tier);

        let generation = resource.generation + 1;
        let grant = GrantId::for_resource(&resource.id, generation);
        let admission = self
            .inner
            .allocator
            .admit(AdmissionRequest {
                grant_id: grant.clone(),
                demands: bundle_demands(&target.id, &spec),
                floor_mandatory: spec.floor_mandatory,
            })
            .await?;
        if let Some(old) = resource.grant.replace(grant) {
            self.inner.allocator.release(&old).await;
        }
        resource.generation = generation;
        resource.device = Some(target.id.clone());
        resource.floor_met = admission.floor_met;
        resource.dominant_share = admission.dominant_share;
        if let Some(b) = resource.bundle_mut() {
            b.latency_class = target_tier;
            b.achieved_gbs = admission.granted_of(Dimension::Bandwidth);
        }

        let now = self.now();
        info!(resource = %resource.id, from = %dropped, to = %target.id, tier = %target_tier, "bundle failed over");
        self.inner
            .journal
            .record(
                now,
                Some(&resource.id),
                EventKind::FailedOver {
                    from: dropped.clone(),
                    to: target.id.clone(),
                    tier: target_tier,
                },
            )
            .await;
        self.assess(resource, now, "failed over with a short floor").await;
        Ok((target.id, target_tier))
    }
}
