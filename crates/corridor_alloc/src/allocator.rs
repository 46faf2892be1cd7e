//! Admission allocator.
//!
//! Simplified dominant-resource-fairness admission over independent pools:
//!
//! 1. A request that fits every pool in full is granted in full.
//! 2. Otherwise each pool grants `min(requested, free)`; the grant is
//!    best-effort (`floor_met = false`) unless the caller marked it
//!    floor-mandatory, in which case nothing is taken and the request fails
//!    with `CapacityExceeded`.
//! 3. Releasing frees everything the grant holds. Unknown ids are a no-op.
//!
//! Requests are served first-come-first-served. Existing grants are never
//! preempted or shrunk to make room for new ones.
//!
//! Pools, grants and wavelength spectra share one reader-writer lock; every
//! mutation is a single short write section.

use crate::pool::{Demand, Dimension, Grant, Pool, PoolKey, PoolUsage, Share};
use crate::spectrum::Spectrum;
use corridor_core::{DeviceId, FabricError, FabricResult, GrantId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Admission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    /// Grant id to hold the shares under
    pub grant_id: GrantId,
    /// Per-pool demands
    pub demands: Vec<Demand>,
    /// Reject rather than partially grant
    pub floor_mandatory: bool,
}

impl AdmissionRequest {
    /// Best-effort request
    #[must_use]
    pub fn new(grant_id: GrantId, demands: Vec<Demand>) -> Self {
        Self {
            grant_id,
            demands,
            floor_mandatory: false,
        }
    }

    /// Mark the request floor-mandatory
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.floor_mandatory = true;
        self
    }
}

/// Admission outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admission {
    /// Grant id
    pub grant_id: GrantId,
    /// Per-pool shares, in request order
    pub shares: Vec<Share>,
    /// Every share fully granted
    pub floor_met: bool,
    /// `max(requested_i / capacity_i)`
    pub dominant_share: f64,
}

impl Admission {
    /// Amount granted in the first pool of a dimension
    #[must_use]
    pub fn granted_of(&self, dimension: Dimension) -> u64 {
        self.shares
            .iter()
            .find(|s| s.pool.dimension == dimension)
            .map_or(0, |s| s.granted)
    }
}

/// Result of resizing one share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    /// Amount now held
    pub granted: u64,
    /// Whether the new request is fully held
    pub met: bool,
}

/// Outcome of losing a wavelength
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LaneLoss {
    /// Wavelength was not in use
    Idle,
    /// Holder moved onto a spare
    Remapped {
        /// Holder
        grant: GrantId,
        /// Lost wavelength
        from: u32,
        /// Spare now held
        to: u32,
    },
    /// No spare; holder lost one lane
    Shrunk {
        /// Holder
        grant: GrantId,
        /// Lost wavelength
        lost: u32,
        /// Lanes still held
        lanes: u64,
    },
}

#[derive(Debug, Default)]
struct AllocState {
    pools: IndexMap<PoolKey, Pool>,
    grants: IndexMap<GrantId, Grant>,
    spectra: HashMap<DeviceId, Spectrum>,
    next_seq: u64,
}

impl AllocState {
    fn pool(&self, key: &PoolKey) -> FabricResult<&Pool> {
        self.pools
            .get(key)
            .ok_or_else(|| FabricError::not_found("pool", key))
    }

    fn dominant_share(&self, grant: &Grant) -> f64 {
        grant
            .shares
            .iter()
            .filter_map(|s| self.pools.get(&s.pool).map(|p| p.share_of(s.requested)))
            .fold(0.0, f64::max)
    }
}

/// Admission allocator
#[derive(Clone, Default)]
pub struct Allocator {
    state: Arc<RwLock<AllocState>>,
}

impl Allocator {
    /// Empty allocator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool or change its capacity
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the new capacity is below current usage
    pub async fn register_pool(&self, key: PoolKey, capacity: u64) -> FabricResult<()> {
        let mut state = self.state.write().await;
        let pool = state.pools.entry(key.clone()).or_default();
        if capacity < pool.used {
            return Err(FabricError::invalid(
                "capacity",
                format!("{key} has {} in use, cannot shrink to {capacity}", pool.used),
            ));
        }
        pool.capacity = capacity;
        debug!(pool = %key, capacity, "pool registered");
        Ok(())
    }

    /// Register a device's wavelength grid.
    ///
    /// The first registration wins; refreshing a device keeps its current
    /// assignments and lost wavelengths.
    pub async fn register_spectrum(&self, device: DeviceId, grid: impl IntoIterator<Item = u32>) {
        let mut state = self.state.write().await;
        state
            .spectra
            .entry(device)
            .or_insert_with(|| Spectrum::new(grid));
    }

    /// Admit a request
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` for a live grant id, `NotFound` for an
    /// unknown pool, `InvalidArgument` if a pool appears twice, and
    /// `CapacityExceeded` when a floor-mandatory request does not fit (pool
    /// usage is left unchanged)
    pub async fn admit(&self, request: AdmissionRequest) -> FabricResult<Admission> {
        let mut state = self.state.write().await;
        Self::admit_locked(&mut state, request)
    }

    /// Admit several requests in arrival order under one lock
    pub async fn admit_batch(&self, requests: Vec<AdmissionRequest>) -> Vec<FabricResult<Admission>> {
        let mut state = self.state.write().await;
        requests
            .into_iter()
            .map(|r| Self::admit_locked(&mut state, r))
            .collect()
    }

    fn admit_locked(state: &mut AllocState, request: AdmissionRequest) -> FabricResult<Admission> {
        if state.grants.contains_key(&request.grant_id) {
            return Err(FabricError::AlreadyExists {
                kind: "grant".to_string(),
                id: request.grant_id.to_string(),
            });
        }

        let mut shares = Vec::with_capacity(request.demands.len());
        for (i, demand) in request.demands.iter().enumerate() {
            if request.demands[..i].iter().any(|d| d.pool == demand.pool) {
                return Err(FabricError::invalid(
                    "demands",
                    format!("pool {} requested twice", demand.pool),
                ));
            }
            let pool = state.pool(&demand.pool)?;
            shares.push(Share {
                pool: demand.pool.clone(),
                requested: demand.amount,
                granted: demand.amount.min(pool.free()),
            });
        }

        let floor_met = shares.iter().all(Share::met);
        if !floor_met && request.floor_mandatory {
            let short = shares.iter().find(|s| !s.met());
            let (pool, requested, available) = short
                .map(|s| (s.pool.to_string(), s.requested, s.granted))
                .unwrap_or_default();
            warn!(grant = %request.grant_id, %pool, requested, available, "floor-mandatory request rejected");
            return Err(FabricError::CapacityExceeded {
                pool,
                requested,
                available,
            });
        }

        for share in &shares {
            if let Some(pool) = state.pools.get_mut(&share.pool) {
                pool.used += share.granted;
            }
        }

        let grant = Grant {
            id: request.grant_id.clone(),
            shares: shares.clone(),
            seq: state.next_seq,
        };
        state.next_seq += 1;
        let dominant_share = state.dominant_share(&grant);
        state.grants.insert(request.grant_id.clone(), grant);

        if floor_met {
            info!(grant = %request.grant_id, dominant_share, "admitted in full");
        } else {
            warn!(grant = %request.grant_id, dominant_share, "admitted best-effort, floor not met");
        }

        Ok(Admission {
            grant_id: request.grant_id,
            shares,
            floor_met,
            dominant_share,
        })
    }

    /// Release a grant and any wavelengths it holds.
    ///
    /// Unknown or already released ids return `None`.
    pub async fn release(&self, grant_id: &GrantId) -> Option<Grant> {
        let mut state = self.state.write().await;
        let grant = state.grants.shift_remove(grant_id)?;
        for share in &grant.shares {
            if let Some(pool) = state.pools.get_mut(&share.pool) {
                pool.used = pool.used.saturating_sub(share.granted);
            }
        }
        for spectrum in state.spectra.values_mut() {
            spectrum.release(grant_id);
        }
        info!(grant = %grant_id, "grant released");
        Some(grant)
    }

    /// Change what a grant asks for in one pool.
    ///
    /// Shrinking always succeeds. Growing takes what is free; a
    /// floor-mandatory resize that cannot be met leaves the grant unchanged.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown grant or a pool the grant does not
    /// hold, and `CapacityExceeded` for an unmet floor-mandatory resize
    pub async fn resize(
        &self,
        grant_id: &GrantId,
        pool: &PoolKey,
        requested: u64,
        floor_mandatory: bool,
    ) -> FabricResult<Resize> {
        let mut state = self.state.write().await;
        let current = state
            .grants
            .get(grant_id)
            .ok_or_else(|| FabricError::not_found("grant", grant_id))?
            .shares
            .iter()
            .find(|s| &s.pool == pool)
            .map(|s| s.granted)
            .ok_or_else(|| FabricError::not_found("share", format!("{grant_id} in {pool}")))?;

        let free = state.pool(pool)?.free();
        let granted = requested.min(current + free);
        if granted < requested && floor_mandatory {
            return Err(FabricError::CapacityExceeded {
                pool: pool.to_string(),
                requested,
                available: current + free,
            });
        }

        if let Some(p) = state.pools.get_mut(pool) {
            p.used = p.used - current + granted;
        }
        if let Some(share) = state
            .grants
            .get_mut(grant_id)
            .and_then(|g| g.shares.iter_mut().find(|s| &s.pool == pool))
        {
            share.requested = requested;
            share.granted = granted;
        }

        info!(grant = %grant_id, %pool, from = current, to = granted, requested, "grant resized");
        Ok(Resize {
            granted,
            met: granted >= requested,
        })
    }

    /// Assign wavelengths on a device to a grant, preferred ones first
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the device has no registered spectrum
    pub async fn assign_wavelengths(
        &self,
        device: &DeviceId,
        grant_id: &GrantId,
        preferred: &[u32],
        count: usize,
    ) -> FabricResult<Vec<u32>> {
        let mut state = self.state.write().await;
        let spectrum = state
            .spectra
            .get_mut(device)
            .ok_or_else(|| FabricError::not_found("spectrum", device))?;
        let assigned = spectrum.assign(grant_id, preferred, count);
        debug!(device = %device, grant = %grant_id, ?assigned, "wavelengths assigned");
        Ok(assigned)
    }

    /// Wavelengths a grant holds on a device
    pub async fn wavelengths_of(&self, device: &DeviceId, grant_id: &GrantId) -> Vec<u32> {
        self.state
            .read()
            .await
            .spectra
            .get(device)
            .map(|s| s.held_by(grant_id))
            .unwrap_or_default()
    }

    /// Lost wavelengths on a device
    pub async fn lost_wavelengths(&self, device: &DeviceId) -> Vec<u32> {
        self.state
            .read()
            .await
            .spectra
            .get(device)
            .map(Spectrum::lost)
            .unwrap_or_default()
    }

    /// Mark a wavelength lost.
    ///
    /// The holder is moved to the lowest spare if there is one. Otherwise it
    /// gives up one lane, and the device's lane pool shrinks to the usable
    /// grid.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a device without a spectrum and
    /// `InvalidArgument` for a wavelength off its grid
    pub async fn lose_wavelength(&self, device: &DeviceId, nm: u32) -> FabricResult<LaneLoss> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let spectrum = state
            .spectra
            .get_mut(device)
            .ok_or_else(|| FabricError::not_found("spectrum", device))?;
        if !spectrum.on_grid(nm) {
            return Err(FabricError::invalid(
                "wavelength",
                format!("{nm} nm is not on the grid of {device}"),
            ));
        }
        if spectrum.is_lost(nm) {
            return Ok(LaneLoss::Idle);
        }

        let holder = spectrum.lose(nm);
        let usable = spectrum.usable();
        let outcome = match holder {
            None => LaneLoss::Idle,
            Some(grant) => match spectrum.take_spare(&grant) {
                Some(to) => {
                    info!(device = %device, grant = %grant, from = nm, to, "wavelength remapped to spare");
                    LaneLoss::Remapped { grant, from: nm, to }
                }
                None => {
                    let key = PoolKey::new(device.clone(), Dimension::Lanes);
                    let mut lanes = 0;
                    if let Some(share) = state
                        .grants
                        .get_mut(&grant)
                        .and_then(|g| g.shares.iter_mut().find(|s| s.pool == key))
                    {
                        share.granted = share.granted.saturating_sub(1);
                        lanes = share.granted;
                        if let Some(pool) = state.pools.get_mut(&key) {
                            pool.used = pool.used.saturating_sub(1);
                        }
                    }
                    warn!(device = %device, grant = %grant, lost = nm, lanes, "no spare wavelength, lane count reduced");
                    LaneLoss::Shrunk { grant, lost: nm, lanes }
                }
            },
        };

        let key = PoolKey::new(device.clone(), Dimension::Lanes);
        if let Some(pool) = state.pools.get_mut(&key) {
            pool.capacity = pool.capacity.min(usable.max(pool.used));
        }
        Ok(outcome)
    }

    /// Live grant
    pub async fn grant(&self, grant_id: &GrantId) -> Option<Grant> {
        self.state.read().await.grants.get(grant_id).cloned()
    }

    /// Snapshot of every pool, in registration order
    pub async fn usage(&self) -> Vec<PoolUsage> {
        self.state
            .read()
            .await
            .pools
            .iter()
            .map(|(k, p)| PoolUsage {
                pool: k.clone(),
                capacity: p.capacity,
                used: p.used,
            })
            .collect()
    }

    /// Snapshot of one pool
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown pool
    pub async fn pool_usage(&self, key: &PoolKey) -> FabricResult<Pool> {
        self.state.read().await.pool(key).copied()
    }

    /// Dominant share of every live grant, in arrival order
    pub async fn dominant_shares(&self) -> Vec<(GrantId, f64)> {
        let state = self.state.read().await;
        state
            .grants
            .values()
            .map(|g| (g.id.clone(), state.dominant_share(g)))
            .collect()
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator").finish_non_exhaustive()
    }
}
