//! Lifecycle supervisor.
//!
//! Resources live in one store keyed by id. The store lock is held only to
//! find or insert an entry; each entry carries its own mutex, so work on
//! one resource (admission, calibration, policy actions) is serialized
//! without blocking the others. Attestation and calibration run with only
//! the entry locked.
//!
//! Admission flow:
//!
//! ```text
//! Pending --ticket ok--> Allocating --admit--> Ready     (floor met, calibrated)
//!                                          \-> Degraded  (best effort or partial calibration)
//! ```
//!
//! A request that fails attestation or admission is rolled back and removed;
//! the error goes straight back to the caller.

use crate::config::SupervisorConfig;
use crate::events::{EventJournal, EventKind};
use crate::metrics::{Counters, MetricsSnapshot};
use crate::resource::{
    BUNDLE_TAIL_P99_MS, BackoffState, BundleSpec, BundleState, CORRIDOR_POWER_PJ_PER_BIT,
    CORRIDOR_TEMPERATURE_C, CorridorSpec, CorridorState, Resource, ResourceSpec, ResourceState,
    Telemetry,
};
use corridor_alloc::{AdmissionRequest, Allocator, Demand, Dimension, PoolKey};
use corridor_attest::{AttestationTicket, AttestationVerifier};
use corridor_calibrate::{CalibrationEngine, CalibrationRequest, CalibrationResult};
use corridor_core::{
    DeviceClass, DeviceId, DeviceStatus, ErrorBody, FabricError, FabricResult, GrantId,
    LatencyClass, Phase, ResourceId, ResourceKind, SharedClock, TicketId, Timestamp,
};
use corridor_inventory::{Device, FabricInventory};
use futures::future::join_all;
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub(crate) struct Entry {
    pub(crate) resource: Mutex<Resource>,
    pub(crate) cancelled: AtomicBool,
}

impl Entry {
    fn new(resource: Resource) -> Self {
        Self {
            resource: Mutex::new(resource),
            cancelled: AtomicBool::new(false),
        }
    }
}

pub(crate) struct Inner {
    pub(crate) config: SupervisorConfig,
    pub(crate) inventory: Arc<FabricInventory>,
    pub(crate) allocator: Allocator,
    pub(crate) verifier: Arc<AttestationVerifier>,
    pub(crate) engine: CalibrationEngine,
    pub(crate) clock: SharedClock,
    pub(crate) resources: RwLock<IndexMap<ResourceId, Arc<Entry>>>,
    pub(crate) journal: EventJournal,
    pub(crate) counters: Counters,
}

/// Lifecycle supervisor
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct Supervisor {
    pub(crate) inner: Arc<Inner>,
}

impl Supervisor {
    /// Create a supervisor over the given components
    #[must_use]
    pub fn new(
        config: SupervisorConfig,
        inventory: Arc<FabricInventory>,
        allocator: Allocator,
        verifier: Arc<AttestationVerifier>,
        engine: CalibrationEngine,
        clock: SharedClock,
    ) -> Self {
        let journal = EventJournal::new(config.event_history);
        Self {
            inner: Arc::new(Inner {
                config,
                inventory,
                allocator,
                verifier,
                engine,
                clock,
                resources: RwLock::new(IndexMap::new()),
                journal,
                counters: Counters::default(),
            }),
        }
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Fabric inventory
    #[must_use]
    pub fn inventory(&self) -> &Arc<FabricInventory> {
        &self.inner.inventory
    }

    /// Pool allocator
    #[must_use]
    pub fn allocator(&self) -> &Allocator {
        &self.inner.allocator
    }

    /// Attestation verifier
    #[must_use]
    pub fn verifier(&self) -> &Arc<AttestationVerifier> {
        &self.inner.verifier
    }

    /// Calibration engine
    #[must_use]
    pub fn engine(&self) -> &CalibrationEngine {
        &self.inner.engine
    }

    /// Event journal
    #[must_use]
    pub fn journal(&self) -> &EventJournal {
        &self.inner.journal
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    /// Register or refresh a device and its pools
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed device or a capacity below
    /// what is already granted
    pub async fn provision_device(&self, device: Device) -> FabricResult<Device> {
        let device = self.inner.inventory.register_device(device).await?;
        let alloc = &self.inner.allocator;
        match device.class {
            DeviceClass::Corridor => {
                alloc
                    .register_pool(PoolKey::new(device.id.clone(), Dimension::Lanes), u64::from(device.lanes))
                    .await?;
                alloc
                    .register_pool(PoolKey::new(device.id.clone(), Dimension::Bandwidth), device.bandwidth)
                    .await?;
                alloc
                    .register_spectrum(device.id.clone(), device.wavelengths_nm.iter().copied())
                    .await;
            }
            DeviceClass::Memory => {
                alloc
                    .register_pool(PoolKey::new(device.id.clone(), Dimension::Bytes), device.capacity_bytes)
                    .await?;
                alloc
                    .register_pool(PoolKey::new(device.id.clone(), Dimension::Bandwidth), device.bandwidth)
                    .await?;
            }
        }
        info!(device = %device.id, class = %device.class, "device provisioned");
        Ok(device)
    }

    /// Allocate a resource: submit and drive it through admission
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed request,
    /// `AttestationRequired`/`AttestationInvalid` when the ticket check
    /// fails, `NotFound`/`Unavailable` for a missing or unusable device and
    /// `CapacityExceeded` when a floor-mandatory request does not fit
    pub async fn allocate(&self, spec: ResourceSpec) -> FabricResult<Resource> {
        let id = self.submit(spec).await?;
        self.drive(&id).await
    }

    /// Register a Pending request under a generated id
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed request
    pub async fn submit(&self, spec: ResourceSpec) -> FabricResult<ResourceId> {
        let id = ResourceId::generate(spec.kind().id_prefix());
        self.submit_with_id(id, spec).await
    }

    /// Register a Pending request under a caller-chosen id
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed request and `AlreadyExists`
    /// if the id is taken
    pub async fn submit_with_id(&self, id: ResourceId, spec: ResourceSpec) -> FabricResult<ResourceId> {
        spec.validate().inspect_err(|_| self.inner.counters.record_error())?;
        let now = self.now();
        let mut resources = self.inner.resources.write().await;
        if resources.contains_key(&id) {
            return Err(FabricError::AlreadyExists {
                kind: spec.kind().to_string(),
                id: id.to_string(),
            });
        }
        resources.insert(id.clone(), Arc::new(Entry::new(Resource::pending(id.clone(), spec, now))));
        debug!(resource = %id, "request submitted");
        Ok(id)
    }

    /// Drive a Pending request through attestation and admission.
    ///
    /// Resources already past Pending are returned as they are.
    ///
    /// # Errors
    ///
    /// Same as [`Supervisor::allocate`]; `NotFound` for an unknown id and
    /// `Cancelled` if the request was abandoned
    pub async fn drive(&self, id: &ResourceId) -> FabricResult<Resource> {
        let entry = self.entry(id).await?;
        let mut resource = entry.resource.lock().await;
        if resource.phase == Phase::Releasing {
            checkpoint(&entry, &resource)?;
        }
        if resource.phase != Phase::Pending {
            return Ok(resource.clone());
        }

        match self.admit(&entry, &mut resource).await {
            Ok(()) => Ok(resource.clone()),
            Err(err) => {
                self.abandon(&mut resource, &err).await;
                Err(err)
            }
        }
    }

    /// Roll back a request that did not make it through admission
    async fn abandon(&self, resource: &mut Resource, err: &FabricError) {
        if let Some(grant) = resource.grant.take() {
            self.inner.allocator.release(&grant).await;
        }
        let _ = self.transition(resource, Phase::Releasing, "admission abandoned").await;
        self.inner.resources.write().await.shift_remove(&resource.id);

        let now = self.now();
        if matches!(err, FabricError::Cancelled { .. }) {
            info!(resource = %resource.id, "request cancelled, partial grant rolled back");
            self.inner.journal.record(now, Some(&resource.id), EventKind::Cancelled).await;
        } else {
            self.inner.counters.record_error();
            warn!(resource = %resource.id, code = %err.code(), error = %err, "admission failed");
        }
    }

    async fn admit(&self, entry: &Entry, resource: &mut Resource) -> FabricResult<()> {
        if resource.spec.attestation_required() {
            let ticket_id = resource
                .spec
                .ticket()
                .cloned()
                .ok_or_else(|| FabricError::AttestationRequired {
                    resource: resource.id.to_string(),
                })?;
            let ticket = self.inner.verifier.require_usable(&ticket_id).await?;
            self.check_subject(resource, &ticket).await?;
            if resource.kind() == ResourceKind::MemoryBundle {
                resource.device = Some(ticket.device_id.clone());
            }
            resource.ticket = Some(ticket.id);
            resource.ticket_expires_at = Some(ticket.expires_at);
        }
        checkpoint(entry, resource)?;
        self.transition(resource, Phase::Allocating, "attestation check passed").await?;

        match resource.spec.clone() {
            ResourceSpec::Corridor(spec) => self.admit_corridor(entry, resource, &spec).await,
            ResourceSpec::MemoryBundle(spec) => self.admit_bundle(entry, resource, &spec).await,
        }
    }

    /// The ticket subject must be a device the resource lands on
    async fn check_subject(&self, resource: &Resource, ticket: &AttestationTicket) -> FabricResult<()> {
        let subject = &ticket.device_id;
        let ok = match &resource.spec {
            ResourceSpec::Corridor(c) => &c.device_id == subject || c.peer_device.as_ref() == Some(subject),
            ResourceSpec::MemoryBundle(b) => match &b.device_id {
                Some(pinned) => pinned == subject,
                None => self
                    .inner
                    .inventory
                    .get_device(subject)
                    .await
                    .is_ok_and(|d| d.class == DeviceClass::Memory),
            },
        };
        if ok {
            Ok(())
        } else {
            warn!(resource = %resource.id, ticket = %ticket.id, device = %subject, "ticket subject does not match request");
            Err(FabricError::attestation_invalid(
                &ticket.id,
                format!("issued for {subject}, which this request does not use"),
            ))
        }
    }

    async fn admit_corridor(&self, entry: &Entry, resource: &mut Resource, spec: &CorridorSpec) -> FabricResult<()> {
        let config = &self.inner.config;
        let device = self.inner.inventory.get_device(&spec.device_id).await?;
        if device.class != DeviceClass::Corridor {
            return Err(FabricError::invalid(
                "device_id",
                format!("{} is {}, not corridor-class", device.id, device.class),
            ));
        }
        if let Some(peer) = &spec.peer_device {
            self.inner.inventory.get_device(peer).await?;
        }
        let device = self.usable(device).await?;

        let grant = GrantId::for_resource(&resource.id, resource.generation);
        let admission = self
            .inner
            .allocator
            .admit(AdmissionRequest {
                grant_id: grant.clone(),
                demands: vec![
                    Demand::new(PoolKey::new(device.id.clone(), Dimension::Lanes), u64::from(spec.lanes)),
                    Demand::new(PoolKey::new(device.id.clone(), Dimension::Bandwidth), spec.min_gbps),
                ],
                floor_mandatory: spec.floor_mandatory,
            })
            .await?;
        resource.grant = Some(grant.clone());
        resource.device = Some(device.id.clone());
        resource.dominant_share = admission.dominant_share;

        let wanted = admission.granted_of(Dimension::Lanes) as usize;
        let wavelengths = self
            .inner
            .allocator
            .assign_wavelengths(&device.id, &grant, &spec.lambda_nm, wanted)
            .await?;
        let lanes = wavelengths.len() as u32;
        let achievable = self.achievable(lanes, &device);
        let floor_met = admission.floor_met && achievable >= spec.min_gbps;
        if !floor_met && spec.floor_mandatory {
            return Err(FabricError::CapacityExceeded {
                pool: format!("{}/bandwidth", device.id),
                requested: spec.min_gbps,
                available: achievable,
            });
        }
        checkpoint(entry, resource)?;

        let calibration = if lanes > 0 {
            let request = CalibrationRequest::new(resource.id.as_str(), config.target_ber, config.initial_ber)
                .with_profile(config.ambient_profile.clone())
                .with_temperature(CORRIDOR_TEMPERATURE_C)
                .with_lambda_count(lanes as usize);
            Some(self.inner.engine.calibrate(&request)?)
        } else {
            None
        };
        checkpoint(entry, resource)?;

        let now = self.now();
        let (ber, eye_margin) = calibration
            .as_ref()
            .map_or((config.initial_ber, 0.0), |c| (c.final_ber, c.final_eye_margin));
        resource.floor_met = floor_met;
        resource.state = Some(ResourceState::Corridor(CorridorState {
            lanes,
            wavelengths_nm: wavelengths,
            achievable_gbps: achievable,
            effective_floor_gbps: spec.min_gbps,
            target_ber: config.target_ber,
            ber,
            eye_margin,
            temperature_c: CORRIDOR_TEMPERATURE_C,
            power_pj_per_bit: CORRIDOR_POWER_PJ_PER_BIT,
            best_effort_share: 1.0,
            surplus_enabled: floor_met,
            calibration: calibration.clone(),
        }));
        self.inner.counters.record_corridor();

        let caveat = match &calibration {
            Some(result) => {
                self.record_calibration(resource, result, now).await;
                result.caveat(resource.id.as_str())
            }
            None => None,
        };
        info!(
            resource = %resource.id,
            device = %device.id,
            lanes,
            achievable_gbps = achievable,
            floor_gbps = spec.min_gbps,
            floor_met,
            "corridor admitted"
        );

        match (floor_met, caveat) {
            (true, None) => {
                self.transition(resource, Phase::Ready, "floor met and calibration converged")
                    .await
            }
            (true, Some(caveat)) => {
                resource.last_error = Some(ErrorBody::from(&caveat));
                self.transition(resource, Phase::Degraded, "calibration reported partial convergence")
                    .await?;
                self.assess(resource, now, "admission").await;
                Ok(())
            }
            (false, _) => {
                self.transition(resource, Phase::Degraded, "admitted best-effort, floor not met")
                    .await?;
                self.assess(resource, now, "admission").await;
                Ok(())
            }
        }
    }

    async fn admit_bundle(&self, entry: &Entry, resource: &mut Resource, spec: &BundleSpec) -> FabricResult<()> {
        let pinned = spec.device_id.clone().or_else(|| resource.device.clone());
        let device = match pinned {
            Some(id) => {
                let device = self.inner.inventory.get_device(&id).await?;
                if device.class != DeviceClass::Memory {
                    return Err(FabricError::invalid(
                        "device_id",
                        format!("{} is {}, not memory-class", device.id, device.class),
                    ));
                }
                self.usable(device).await?
            }
            None => self.pick_memory_device(spec.latency_class, None, false).await?,
        };

        let grant = GrantId::for_resource(&resource.id, resource.generation);
        let admission = self
            .inner
            .allocator
            .admit(AdmissionRequest {
                grant_id: grant.clone(),
                demands: bundle_demands(&device.id, spec),
                floor_mandatory: spec.floor_mandatory,
            })
            .await?;
        resource.grant = Some(grant);
        resource.device = Some(device.id.clone());
        resource.dominant_share = admission.dominant_share;
        checkpoint(entry, resource)?;

        let achieved = admission.granted_of(Dimension::Bandwidth);
        let tier = device.tier.unwrap_or(spec.latency_class);
        resource.floor_met = admission.floor_met;
        resource.state = Some(ResourceState::MemoryBundle(BundleState {
            latency_class: tier,
            achieved_gbs: achieved,
            moved_pages: 0,
            tail_p99_ms: BUNDLE_TAIL_P99_MS,
            migrating: false,
        }));
        self.inner.counters.record_bundle();
        info!(
            resource = %resource.id,
            device = %device.id,
            tier = %tier,
            achieved_gbs = achieved,
            floor_gbs = spec.bandwidth_floor_gbs,
            floor_met = admission.floor_met,
            "memory bundle admitted"
        );

        if admission.floor_met {
            self.transition(resource, Phase::Ready, "floor met").await
        } else {
            self.transition(resource, Phase::Degraded, "admitted best-effort, floor not met")
                .await?;
            let now = self.now();
            self.assess(resource, now, "admission").await;
            Ok(())
        }
    }

    /// `lanes * lane rate`, capped by the device's native bandwidth
    pub(crate) fn achievable(&self, lanes: u32, device: &Device) -> u64 {
        (u64::from(lanes) * self.inner.config.lane_rate_gbps).min(device.bandwidth)
    }

    /// A device new work may land on, re-enumerating it once if it dropped
    pub(crate) async fn usable(&self, device: Device) -> FabricResult<Device> {
        if device.is_admissible() {
            return Ok(device);
        }
        if device.status == DeviceStatus::Disabled && self.inner.inventory.reenumerate(&device.id).await? {
            return self.inner.inventory.get_device(&device.id).await;
        }
        Err(FabricError::unavailable(&device.id, format!("device is {}", device.status)))
    }

    /// Active memory device for a tier.
    ///
    /// With `nearest`, other tiers are acceptable and the closest wins.
    /// Ties go to the device with the most free bandwidth.
    pub(crate) async fn pick_memory_device(
        &self,
        tier: LatencyClass,
        exclude: Option<&DeviceId>,
        nearest: bool,
    ) -> FabricResult<Device> {
        let mut candidates = Vec::new();
        for device in self.inner.inventory.list_devices().await {
            let Some(device_tier) = device.tier else { continue };
            if device.class != DeviceClass::Memory
                || !device.is_admissible()
                || exclude == Some(&device.id)
                || (!nearest && device_tier != tier)
            {
                continue;
            }
            let free = self
                .inner
                .allocator
                .pool_usage(&PoolKey::new(device.id.clone(), Dimension::Bandwidth))
                .await
                .map_or(0, |p| p.free());
            candidates.push((device_tier.distance(tier), free, device));
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        candidates
            .into_iter()
            .next()
            .map(|(_, _, d)| d)
            .ok_or_else(|| FabricError::unavailable(format!("tier {tier}"), "no active memory-class device"))
    }

    /// Apply a phase transition and record it.
    ///
    /// Transitions toward service (Allocating, Ready) are refused while the
    /// resource holds an expired ticket.
    pub(crate) async fn transition(&self, resource: &mut Resource, next: Phase, reason: &str) -> FabricResult<()> {
        let now = self.now();
        if matches!(next, Phase::Allocating | Phase::Ready) && resource.ticket_expired(now) {
            warn!(resource = %resource.id, to = %next, "transition blocked by expired attestation ticket");
            self.inner
                .journal
                .record(
                    now,
                    Some(&resource.id),
                    EventKind::AttestationExpired {
                        ticket: resource.ticket.clone(),
                    },
                )
                .await;
            return Err(expired(resource));
        }

        let from = resource.phase;
        resource.phase = from.transition(next)?;
        resource.updated_at = now;
        match next {
            Phase::Degraded => {
                resource.degraded_since = Some(now);
                resource.healthy_since = None;
                resource.backoff = Some(BackoffState {
                    attempt: 0,
                    next_at: now.saturating_add(self.inner.config.backoff.delay(0)),
                });
            }
            Phase::Ready => {
                resource.degraded_since = None;
                resource.healthy_since = None;
                resource.backoff = None;
                resource.last_error = None;
            }
            Phase::Failed | Phase::Releasing => {
                resource.backoff = None;
            }
            Phase::Pending | Phase::Allocating => {}
        }

        info!(resource = %resource.id, %from, to = %next, reason, "phase transition");
        self.inner
            .journal
            .record(
                now,
                Some(&resource.id),
                EventKind::PhaseChanged {
                    from,
                    to: next,
                    reason: reason.to_string(),
                },
            )
            .await;
        Ok(())
    }

    pub(crate) async fn record_calibration(&self, resource: &Resource, result: &CalibrationResult, now: Timestamp) {
        self.inner
            .journal
            .record(
                now,
                Some(&resource.id),
                EventKind::Calibrated {
                    converged: result.converged,
                    final_ber: result.final_ber,
                    iterations: result.iterations,
                },
            )
            .await;
    }

    /// Release a resource.
    ///
    /// Pool shares are returned before the id is removed, so the id is free
    /// for reuse once this returns. Unknown ids and repeated releases are a
    /// no-op returning `None`.
    ///
    /// # Errors
    ///
    /// Only fails if the store is inconsistent
    pub async fn release(&self, id: &ResourceId) -> FabricResult<Option<Resource>> {
        let Some(entry) = self.inner.resources.read().await.get(id).cloned() else {
            debug!(resource = %id, "release of unknown resource ignored");
            return Ok(None);
        };
        let mut resource = entry.resource.lock().await;
        if resource.phase == Phase::Releasing {
            return Ok(None);
        }

        self.transition(&mut resource, Phase::Releasing, "teardown requested").await?;
        if let Some(grant) = resource.grant.take() {
            self.inner.allocator.release(&grant).await;
        }
        self.inner.resources.write().await.shift_remove(id);

        info!(resource = %id, "resource released");
        self.inner
            .journal
            .record(self.now(), Some(id), EventKind::Released)
            .await;
        Ok(Some(resource.clone()))
    }

    /// Abandon a Pending or Allocating request.
    ///
    /// An in-flight admission notices at its next step and rolls back any
    /// partial grant.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `InvalidArgument` for a
    /// resource that already settled (use release instead)
    pub async fn cancel(&self, id: &ResourceId) -> FabricResult<()> {
        let entry = self.entry(id).await?;
        entry.cancelled.store(true, Ordering::SeqCst);
        let mut resource = entry.resource.lock().await;
        match resource.phase {
            Phase::Releasing => Ok(()),
            Phase::Pending | Phase::Allocating => {
                let err = FabricError::Cancelled {
                    resource: id.to_string(),
                };
                self.abandon(&mut resource, &err).await;
                Ok(())
            }
            phase => {
                entry.cancelled.store(false, Ordering::SeqCst);
                Err(FabricError::invalid(
                    "resource",
                    format!("{id} is {phase}; release it instead"),
                ))
            }
        }
    }

    /// Idempotent reconciliation: return the resource with this id, admitting
    /// it first only if it does not exist yet
    ///
    /// # Errors
    ///
    /// Same as [`Supervisor::allocate`]
    pub async fn ensure(&self, id: ResourceId, spec: ResourceSpec) -> FabricResult<Resource> {
        match self.submit_with_id(id.clone(), spec).await {
            Ok(_) | Err(FabricError::AlreadyExists { .. }) => self.drive(&id).await,
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn entry(&self, id: &ResourceId) -> FabricResult<Arc<Entry>> {
        self.inner
            .resources
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| FabricError::not_found("resource", id))
    }

    pub(crate) async fn entries(&self) -> Vec<Arc<Entry>> {
        self.inner.resources.read().await.values().cloned().collect()
    }

    /// One resource
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id
    pub async fn get(&self, id: &ResourceId) -> FabricResult<Resource> {
        let entry = self.entry(id).await?;
        let resource = entry.resource.lock().await;
        Ok(resource.clone())
    }

    /// All resources, in submission order
    pub async fn list(&self) -> Vec<Resource> {
        let mut out = Vec::new();
        for entry in self.entries().await {
            out.push(entry.resource.lock().await.clone());
        }
        out
    }

    /// Telemetry of one resource
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id
    pub async fn get_telemetry(&self, id: &ResourceId) -> FabricResult<Telemetry> {
        Ok(self.get(id).await?.telemetry())
    }

    /// Whether a resource is Ready; unknown ids are not
    pub async fn is_ready(&self, id: &ResourceId) -> bool {
        self.get(id).await.is_ok_and(|r| r.phase == Phase::Ready)
    }

    /// Whether every referenced resource is Ready
    pub async fn all_ready(&self, ids: &[ResourceId]) -> bool {
        join_all(ids.iter().map(|id| self.is_ready(id)))
            .await
            .into_iter()
            .all(|ready| ready)
    }

    /// Change the bandwidth floor of a live resource
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `InvalidArgument` unless the
    /// resource is Ready or Degraded, `AttestationInvalid` while its ticket
    /// is expired and `CapacityExceeded` for an unmet floor-mandatory raise
    pub async fn adjust_bandwidth_floor(&self, id: &ResourceId, floor: u64) -> FabricResult<Resource> {
        self.adjust_floor_inner(id, floor)
            .await
            .inspect_err(|_| self.inner.counters.record_error())
    }

    async fn adjust_floor_inner(&self, id: &ResourceId, floor: u64) -> FabricResult<Resource> {
        let entry = self.entry(id).await?;
        let mut resource = entry.resource.lock().await;
        let now = self.now();
        require_settled(&resource)?;
        if resource.ticket_expired(now) {
            return Err(expired(&resource));
        }
        let (device, grant) = holdings(&resource)?;

        let resize = self
            .inner
            .allocator
            .resize(
                &grant,
                &PoolKey::new(device, Dimension::Bandwidth),
                floor,
                resource.spec.floor_mandatory(),
            )
            .await?;

        let previous = resource.spec.floor();
        let r = &mut *resource;
        match (&mut r.spec, &mut r.state) {
            (ResourceSpec::Corridor(spec), Some(ResourceState::Corridor(state))) => {
                spec.min_gbps = floor;
                state.effective_floor_gbps = floor;
                r.floor_met = resize.met && state.achievable_gbps >= floor;
            }
            (ResourceSpec::MemoryBundle(spec), Some(ResourceState::MemoryBundle(state))) => {
                spec.bandwidth_floor_gbs = floor;
                state.achieved_gbs = resize.granted;
                r.floor_met = resize.met;
            }
            _ => return Err(FabricError::Internal {
                message: format!("{id} has no state matching its kind"),
            }),
        }

        info!(resource = %id, from = previous, to = floor, met = resource.floor_met, "bandwidth floor adjusted");
        self.inner
            .journal
            .record(
                now,
                Some(id),
                EventKind::FloorAdjusted {
                    from: previous,
                    to: floor,
                    met: resource.floor_met,
                },
            )
            .await;
        self.assess(&mut resource, now, "bandwidth floor adjusted").await;
        Ok(resource.clone())
    }

    /// Recalibrate a live corridor from its measured BER
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `InvalidArgument` for a bundle,
    /// an unsettled corridor, an unknown profile or a bad target, and
    /// `AttestationInvalid` while its ticket is expired
    pub async fn recalibrate(
        &self,
        id: &ResourceId,
        target_ber: f64,
        ambient_profile: Option<String>,
    ) -> FabricResult<CalibrationResult> {
        let entry = self.entry(id).await?;
        let mut resource = entry.resource.lock().await;
        let now = self.now();
        require_settled(&resource)?;
        if resource.ticket_expired(now) {
            return Err(expired(&resource));
        }
        let Some(state) = resource.corridor() else {
            return Err(FabricError::invalid("resource", format!("{id} is not a corridor")));
        };
        if state.lanes == 0 {
            return Err(FabricError::invalid("resource", format!("{id} holds no lanes")));
        }

        let request = CalibrationRequest::new(id.as_str(), target_ber, state.ber)
            .with_profile(ambient_profile.unwrap_or_else(|| self.inner.config.ambient_profile.clone()))
            .with_temperature(state.temperature_c)
            .with_lambda_count(state.lanes as usize);
        let result = self
            .inner
            .engine
            .calibrate(&request)
            .inspect_err(|_| self.inner.counters.record_error())?;

        if let Some(state) = resource.corridor_mut() {
            state.ber = result.final_ber;
            state.eye_margin = result.final_eye_margin;
            state.target_ber = target_ber;
            state.calibration = Some(result.clone());
        }
        self.record_calibration(&resource, &result, now).await;
        self.assess(&mut resource, now, "recalibration").await;
        Ok(result)
    }

    /// Replace the ticket of a resource, typically after expiry
    ///
    /// # Errors
    ///
    /// Returns `AttestationInvalid` for an unusable ticket or one issued for
    /// a device the resource does not use, `NotFound` for an unknown id
    pub async fn reattest(&self, id: &ResourceId, ticket: &TicketId) -> FabricResult<Resource> {
        let ticket = self
            .inner
            .verifier
            .require_usable(ticket)
            .await
            .inspect_err(|_| self.inner.counters.record_error())?;
        let entry = self.entry(id).await?;
        let mut resource = entry.resource.lock().await;
        let subject_ok = resource.references(&ticket.device_id);
        if !subject_ok {
            return Err(FabricError::attestation_invalid(
                &ticket.id,
                format!("issued for {}, which {id} does not use", ticket.device_id),
            ));
        }

        resource.ticket = Some(ticket.id.clone());
        resource.ticket_expires_at = Some(ticket.expires_at);
        resource.updated_at = self.now();
        info!(resource = %id, ticket = %ticket.id, expires_at = %ticket.expires_at, "resource re-attested");
        self.inner
            .journal
            .record(self.now(), Some(id), EventKind::Reattested { ticket: ticket.id })
            .await;
        Ok(resource.clone())
    }

    /// Metric snapshot
    pub async fn metrics(&self) -> MetricsSnapshot {
        let mut corridor_gbps = 0;
        let mut bundle_gbs = 0;
        for resource in self.list().await {
            if !resource.phase.holds_shares() {
                continue;
            }
            match &resource.state {
                Some(ResourceState::Corridor(c)) => corridor_gbps += c.achievable_gbps,
                Some(ResourceState::MemoryBundle(b)) => bundle_gbs += b.achieved_gbs,
                None => {}
            }
        }
        let attestations = self.inner.verifier.issued_count().await;
        self.inner.counters.snapshot(corridor_gbps, bundle_gbs, attestations)
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

pub(crate) fn bundle_demands(device: &DeviceId, spec: &BundleSpec) -> Vec<Demand> {
    vec![
        Demand::new(PoolKey::new(device.clone(), Dimension::Bytes), spec.bytes),
        Demand::new(PoolKey::new(device.clone(), Dimension::Bandwidth), spec.bandwidth_floor_gbs),
    ]
}

fn checkpoint(entry: &Entry, resource: &Resource) -> FabricResult<()> {
    if entry.cancelled.load(Ordering::SeqCst) {
        Err(FabricError::Cancelled {
            resource: resource.id.to_string(),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn require_settled(resource: &Resource) -> FabricResult<()> {
    match resource.phase {
        Phase::Ready | Phase::Degraded => Ok(()),
        phase => Err(FabricError::invalid(
            "resource",
            format!("{} is {phase}, expected Ready or Degraded", resource.id),
        )),
    }
}

pub(crate) fn holdings(resource: &Resource) -> FabricResult<(DeviceId, GrantId)> {
    match (&resource.device, &resource.grant) {
        (Some(device), Some(grant)) => Ok((device.clone(), grant.clone())),
        _ => Err(FabricError::Internal {
            message: format!("{} is {} but holds no grant", resource.id, resource.phase),
        }),
    }
}

pub(crate) fn expired(resource: &Resource) -> FabricError {
    let ticket = resource
        .ticket
        .as_ref()
        .map_or_else(|| "none".to_string(), ToString::to_string);
    let at = resource.ticket_expires_at.unwrap_or_default();
    FabricError::attestation_invalid(ticket, format!("expired at {at}; re-attest first"))
}
