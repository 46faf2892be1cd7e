//! Fabric resources: corridors and memory bundles.
//!
//! Both kinds share one lifecycle ([`Phase`]) and one record type
//! ([`Resource`]); what differs is carried in the [`ResourceSpec`] and
//! [`ResourceState`] variants.

use corridor_calibrate::CalibrationResult;
use corridor_core::{
    DeviceId, ErrorBody, FabricError, FabricResult, GrantId, LatencyClass, Persistence, Phase,
    Priority, ResourceId, ResourceKind, TicketId, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Corridor temperature reported until a measurement arrives
pub const CORRIDOR_TEMPERATURE_C: f64 = 47.5;
/// Corridor energy per bit
pub const CORRIDOR_POWER_PJ_PER_BIT: f64 = 0.9;
/// Memory device temperature
pub const BUNDLE_TEMPERATURE_C: f64 = 45.2;
/// Memory device power draw
pub const BUNDLE_POWER_W: f64 = 12.5;
/// Sampled p99 access latency of a bundle
pub const BUNDLE_TAIL_P99_MS: f64 = 2.1;
/// Pages moved by one latency class migration
pub const PAGES_PER_MIGRATION: u64 = 1_000_000;

fn default_corridor_type() -> String {
    "SiCorridor".to_string()
}

fn default_lanes() -> u32 {
    8
}

fn default_lambda() -> Vec<u32> {
    (1550..1558).collect()
}

fn default_min_gbps() -> u64 {
    400
}

fn default_latency_budget() -> u64 {
    250
}

fn default_reach() -> u32 {
    75
}

fn default_true() -> bool {
    true
}

fn default_security_domain() -> String {
    "default".to_string()
}

/// Corridor QoS class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorridorQos {
    /// Priority class
    #[serde(default = "gold")]
    pub priority: Priority,
    /// Priority flow control
    #[serde(default = "default_true")]
    pub pfc: bool,
}

fn gold() -> Priority {
    Priority::Gold
}

impl Default for CorridorQos {
    fn default() -> Self {
        Self {
            priority: Priority::Gold,
            pfc: true,
        }
    }
}

/// Corridor request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorSpec {
    /// Corridor technology
    #[serde(rename = "type", default = "default_corridor_type")]
    pub corridor_type: String,
    /// Corridor-class device providing the lanes
    pub device_id: DeviceId,
    /// Far end, if it is a managed device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_device: Option<DeviceId>,
    /// Lane count
    #[serde(default = "default_lanes")]
    pub lanes: u32,
    /// Preferred wavelengths, one per lane
    #[serde(default = "default_lambda")]
    pub lambda_nm: Vec<u32>,
    /// Bandwidth floor
    #[serde(default = "default_min_gbps")]
    pub min_gbps: u64,
    /// Latency budget
    #[serde(default = "default_latency_budget")]
    pub latency_budget_ns: u64,
    /// Reach
    #[serde(default = "default_reach")]
    pub reach_mm: u32,
    /// QoS class
    #[serde(default)]
    pub qos: CorridorQos,
    /// Attestation required before admission
    #[serde(default = "default_true")]
    pub attestation_required: bool,
    /// Ticket presented with the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_ticket: Option<TicketId>,
    /// Reject instead of granting best-effort
    #[serde(default)]
    pub floor_mandatory: bool,
}

impl CorridorSpec {
    /// Request with the usual defaults on a device
    #[must_use]
    pub fn new(device_id: impl Into<DeviceId>) -> Self {
        Self {
            corridor_type: default_corridor_type(),
            device_id: device_id.into(),
            peer_device: None,
            lanes: default_lanes(),
            lambda_nm: default_lambda(),
            min_gbps: default_min_gbps(),
            latency_budget_ns: default_latency_budget(),
            reach_mm: default_reach(),
            qos: CorridorQos::default(),
            attestation_required: true,
            attestation_ticket: None,
            floor_mandatory: false,
        }
    }

    /// Set lanes and wavelengths
    #[must_use]
    pub fn with_lanes(mut self, lanes: u32, lambda_nm: Vec<u32>) -> Self {
        self.lanes = lanes;
        self.lambda_nm = lambda_nm;
        self
    }

    /// Set the bandwidth floor
    #[must_use]
    pub fn with_floor(mut self, min_gbps: u64) -> Self {
        self.min_gbps = min_gbps;
        self
    }

    /// Present an attestation ticket
    #[must_use]
    pub fn with_ticket(mut self, ticket: TicketId) -> Self {
        self.attestation_ticket = Some(ticket);
        self
    }

    /// Drop the attestation requirement
    #[must_use]
    pub fn without_attestation(mut self) -> Self {
        self.attestation_required = false;
        self
    }

    /// Set the peer device
    #[must_use]
    pub fn with_peer(mut self, peer: impl Into<DeviceId>) -> Self {
        self.peer_device = Some(peer.into());
        self
    }
}

/// Memory bundle request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSpec {
    /// Bytes to reserve
    pub bytes: u64,
    /// Latency class
    pub latency_class: LatencyClass,
    /// Bandwidth floor in GB/s
    #[serde(rename = "bandwidth_floor_GBs")]
    pub bandwidth_floor_gbs: u64,
    /// Persistence mode
    #[serde(default)]
    pub persistence: Persistence,
    /// Shareable across tenants in the same domain
    #[serde(default)]
    pub shareable: bool,
    /// Security domain
    #[serde(default = "default_security_domain")]
    pub security_domain: String,
    /// Pin to one memory device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Attestation required before admission
    #[serde(default)]
    pub attestation_required: bool,
    /// Ticket presented with the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_ticket: Option<TicketId>,
    /// Reject instead of granting best-effort
    #[serde(default)]
    pub floor_mandatory: bool,
}

impl BundleSpec {
    /// Bundle request
    #[must_use]
    pub fn new(bytes: u64, latency_class: LatencyClass, bandwidth_floor_gbs: u64) -> Self {
        Self {
            bytes,
            latency_class,
            bandwidth_floor_gbs,
            persistence: Persistence::None,
            shareable: false,
            security_domain: default_security_domain(),
            device_id: None,
            attestation_required: false,
            attestation_ticket: None,
            floor_mandatory: false,
        }
    }

    /// Pin to a device
    #[must_use]
    pub fn on_device(mut self, device: impl Into<DeviceId>) -> Self {
        self.device_id = Some(device.into());
        self
    }

    /// Require attestation with a ticket
    #[must_use]
    pub fn with_ticket(mut self, ticket: TicketId) -> Self {
        self.attestation_required = true;
        self.attestation_ticket = Some(ticket);
        self
    }

    /// Reject rather than grant best-effort
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.floor_mandatory = true;
        self
    }
}

/// Allocation request, tagged by resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    /// Optical corridor
    Corridor(CorridorSpec),
    /// Pooled memory bundle
    MemoryBundle(BundleSpec),
}

impl ResourceSpec {
    /// Resource kind
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Corridor(_) => ResourceKind::Corridor,
            Self::MemoryBundle(_) => ResourceKind::MemoryBundle,
        }
    }

    /// Whether a usable ticket must be presented
    #[must_use]
    pub fn attestation_required(&self) -> bool {
        match self {
            Self::Corridor(c) => c.attestation_required,
            Self::MemoryBundle(b) => b.attestation_required,
        }
    }

    /// Ticket presented
    #[must_use]
    pub fn ticket(&self) -> Option<&TicketId> {
        match self {
            Self::Corridor(c) => c.attestation_ticket.as_ref(),
            Self::MemoryBundle(b) => b.attestation_ticket.as_ref(),
        }
    }

    /// Whether a partial grant must be rejected
    #[must_use]
    pub fn floor_mandatory(&self) -> bool {
        match self {
            Self::Corridor(c) => c.floor_mandatory,
            Self::MemoryBundle(b) => b.floor_mandatory,
        }
    }

    /// Bandwidth floor (Gbps for corridors, GB/s for bundles)
    #[must_use]
    pub fn floor(&self) -> u64 {
        match self {
            Self::Corridor(c) => c.min_gbps,
            Self::MemoryBundle(b) => b.bandwidth_floor_gbs,
        }
    }

    /// Reject malformed requests
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero lane count, a wavelength list
    /// whose length differs from the lane count, duplicate wavelengths, or
    /// a zero-byte bundle
    pub fn validate(&self) -> FabricResult<()> {
        match self {
            Self::Corridor(c) => {
                if c.lanes == 0 {
                    return Err(FabricError::invalid("lanes", "must be at least 1"));
                }
                if !c.lambda_nm.is_empty() && c.lambda_nm.len() != c.lanes as usize {
                    return Err(FabricError::invalid(
                        "lambda_nm",
                        format!("{} wavelengths for {} lanes", c.lambda_nm.len(), c.lanes),
                    ));
                }
                let mut sorted = c.lambda_nm.clone();
                sorted.sort_unstable();
                sorted.dedup();
                if sorted.len() != c.lambda_nm.len() {
                    return Err(FabricError::invalid("lambda_nm", "duplicate wavelength"));
                }
            }
            Self::MemoryBundle(b) => {
                if b.bytes == 0 {
                    return Err(FabricError::invalid("bytes", "must be non-zero"));
                }
            }
        }
        Ok(())
    }
}

/// Live corridor state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorState {
    /// Lanes held
    pub lanes: u32,
    /// Wavelengths held
    pub wavelengths_nm: Vec<u32>,
    /// `lanes * lane rate`, capped by the device
    pub achievable_gbps: u64,
    /// Floor currently honoured after lane loss
    pub effective_floor_gbps: u64,
    /// Calibration target
    pub target_ber: f64,
    /// Measured bit-error-rate
    pub ber: f64,
    /// Measured eye margin
    pub eye_margin: f64,
    /// Device temperature
    pub temperature_c: f64,
    /// Energy per bit
    pub power_pj_per_bit: f64,
    /// Fraction of best-effort traffic admitted
    pub best_effort_share: f64,
    /// Surplus above the floor offered to best-effort traffic
    pub surplus_enabled: bool,
    /// Last calibration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationResult>,
}

/// Live memory bundle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleState {
    /// Current tier
    pub latency_class: LatencyClass,
    /// Bandwidth held
    #[serde(rename = "achieved_GBs")]
    pub achieved_gbs: u64,
    /// Pages moved by migrations
    pub moved_pages: u64,
    /// Sampled p99 latency
    pub tail_p99_ms: f64,
    /// Migration in flight
    pub migrating: bool,
}

/// Kind-specific live state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceState {
    /// Corridor
    Corridor(CorridorState),
    /// Memory bundle
    MemoryBundle(BundleState),
}

/// Recovery back-off bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffState {
    /// Attempts made so far
    pub attempt: u32,
    /// Next attempt is due at
    pub next_at: Timestamp,
}

/// A corridor or memory bundle under supervision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier
    pub id: ResourceId,
    /// Original request, with floors as currently adjusted
    pub spec: ResourceSpec,
    /// Lifecycle phase
    pub phase: Phase,
    /// Every floor met
    pub floor_met: bool,
    /// Dominant share at admission
    pub dominant_share: f64,
    /// Device holding the grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceId>,
    /// Pool grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<GrantId>,
    /// Grant generation; bumped by migration and failover
    pub generation: u32,
    /// Ticket in force
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketId>,
    /// Expiry of the ticket in force
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_expires_at: Option<Timestamp>,
    /// Kind-specific state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    /// Entered Degraded at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_since: Option<Timestamp>,
    /// Telemetry healthy since
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy_since: Option<Timestamp>,
    /// Recovery back-off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<BackoffState>,
    /// Last error or caveat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorBody>,
    /// Created at
    pub created_at: Timestamp,
    /// Last change
    pub updated_at: Timestamp,
}

impl Resource {
    /// Fresh Pending resource
    #[must_use]
    pub fn pending(id: ResourceId, spec: ResourceSpec, now: Timestamp) -> Self {
        Self {
            id,
            spec,
            phase: Phase::Pending,
            floor_met: false,
            dominant_share: 0.0,
            device: None,
            grant: None,
            generation: 0,
            ticket: None,
            ticket_expires_at: None,
            state: None,
            degraded_since: None,
            healthy_since: None,
            backoff: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resource kind
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    /// Corridor state, if this is an admitted corridor
    #[must_use]
    pub fn corridor(&self) -> Option<&CorridorState> {
        match &self.state {
            Some(ResourceState::Corridor(c)) => Some(c),
            _ => None,
        }
    }

    /// Mutable corridor state
    pub fn corridor_mut(&mut self) -> Option<&mut CorridorState> {
        match &mut self.state {
            Some(ResourceState::Corridor(c)) => Some(c),
            _ => None,
        }
    }

    /// Bundle state, if this is an admitted bundle
    #[must_use]
    pub fn bundle(&self) -> Option<&BundleState> {
        match &self.state {
            Some(ResourceState::MemoryBundle(b)) => Some(b),
            _ => None,
        }
    }

    /// Mutable bundle state
    pub fn bundle_mut(&mut self) -> Option<&mut BundleState> {
        match &mut self.state {
            Some(ResourceState::MemoryBundle(b)) => Some(b),
            _ => None,
        }
    }

    /// Whether the resource depends on a device
    #[must_use]
    pub fn references(&self, device: &DeviceId) -> bool {
        if self.device.as_ref() == Some(device) {
            return true;
        }
        match &self.spec {
            ResourceSpec::Corridor(c) => &c.device_id == device || c.peer_device.as_ref() == Some(device),
            ResourceSpec::MemoryBundle(_) => false,
        }
    }

    /// Whether the ticket in force has expired
    #[must_use]
    pub fn ticket_expired(&self, now: Timestamp) -> bool {
        self.spec.attestation_required() && self.ticket_expires_at.is_some_and(|at| now >= at)
    }

    /// Achieved bandwidth (Gbps for corridors, GB/s for bundles)
    #[must_use]
    pub fn achieved(&self) -> u64 {
        match &self.state {
            Some(ResourceState::Corridor(c)) => c.achievable_gbps,
            Some(ResourceState::MemoryBundle(b)) => b.achieved_gbs,
            None => 0,
        }
    }

    /// Whether telemetry is within threshold
    #[must_use]
    pub fn telemetry_healthy(&self, drift_ratio: f64) -> bool {
        match &self.state {
            Some(ResourceState::Corridor(c)) => {
                c.ber <= c.target_ber * drift_ratio && c.achievable_gbps >= c.effective_floor_gbps
            }
            Some(ResourceState::MemoryBundle(b)) => b.achieved_gbs >= self.spec.floor(),
            None => false,
        }
    }

    /// Telemetry snapshot
    #[must_use]
    pub fn telemetry(&self) -> Telemetry {
        let floor = self.spec.floor();
        match &self.state {
            Some(ResourceState::Corridor(c)) => Telemetry {
                id: self.id.clone(),
                kind: self.kind(),
                phase: self.phase,
                achieved: c.achievable_gbps,
                floor,
                tail_p99_ms: None,
                temperature_c: c.temperature_c,
                power: c.power_pj_per_bit,
                ber: Some(c.ber),
                eye_margin: Some(c.eye_margin),
                moved_pages: None,
                utilization_percent: utilization(floor, c.achievable_gbps),
            },
            Some(ResourceState::MemoryBundle(b)) => Telemetry {
                id: self.id.clone(),
                kind: self.kind(),
                phase: self.phase,
                achieved: b.achieved_gbs,
                floor,
                tail_p99_ms: Some(b.tail_p99_ms),
                temperature_c: BUNDLE_TEMPERATURE_C,
                power: BUNDLE_POWER_W,
                ber: None,
                eye_margin: None,
                moved_pages: Some(b.moved_pages),
                utilization_percent: utilization(floor, b.achieved_gbs),
            },
            None => Telemetry {
                id: self.id.clone(),
                kind: self.kind(),
                phase: self.phase,
                achieved: 0,
                floor,
                tail_p99_ms: None,
                temperature_c: 0.0,
                power: 0.0,
                ber: None,
                eye_margin: None,
                moved_pages: None,
                utilization_percent: 0.0,
            },
        }
    }
}

fn utilization(floor: u64, achieved: u64) -> f64 {
    if achieved == 0 {
        0.0
    } else {
        (floor as f64 / achieved as f64 * 100.0).min(100.0)
    }
}

/// Telemetry of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Resource
    pub id: ResourceId,
    /// Kind
    pub kind: ResourceKind,
    /// Phase
    pub phase: Phase,
    /// Achieved bandwidth
    pub achieved: u64,
    /// Bandwidth floor
    pub floor: u64,
    /// p99 access latency (bundles)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail_p99_ms: Option<f64>,
    /// Temperature
    pub temperature_c: f64,
    /// pJ/bit for corridors, W for bundles
    pub power: f64,
    /// Bit-error-rate (corridors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ber: Option<f64>,
    /// Eye margin (corridors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_margin: Option<f64>,
    /// Pages moved (bundles)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_pages: Option<u64>,
    /// Floor as a share of achieved bandwidth
    pub utilization_percent: f64,
}

/// Telemetry sample fed into the failure policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Measured bit-error-rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ber: Option<f64>,
    /// Measured eye margin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_margin: Option<f64>,
    /// Measured achieved bandwidth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved: Option<u64>,
    /// Measured temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
}

impl Observation {
    /// BER sample
    #[must_use]
    pub fn ber(ber: f64) -> Self {
        Self {
            ber: Some(ber),
            ..Self::default()
        }
    }

    /// Achieved bandwidth sample
    #[must_use]
    pub fn achieved(achieved: u64) -> Self {
        Self {
            achieved: Some(achieved),
            ..Self::default()
        }
    }
}
