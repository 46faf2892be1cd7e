//! Pools, demands and grants.

use corridor_core::{DeviceId, GrantId};
use serde::{Deserialize, Serialize};

/// Resource dimension of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// Optical lanes
    Lanes,
    /// Bandwidth (Gbps or GB/s, per device class)
    Bandwidth,
    /// Memory bytes
    Bytes,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Lanes => "lanes",
            Self::Bandwidth => "bandwidth",
            Self::Bytes => "bytes",
        })
    }
}

/// Pool identity: one dimension of one device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey {
    /// Owning device
    pub device: DeviceId,
    /// Dimension
    pub dimension: Dimension,
}

impl PoolKey {
    /// Create a pool key
    #[must_use]
    pub fn new(device: impl Into<DeviceId>, dimension: Dimension) -> Self {
        Self {
            device: device.into(),
            dimension,
        }
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device, self.dimension)
    }
}

/// Capacity and usage of one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Provisioned capacity
    pub capacity: u64,
    /// Sum of live grants
    pub used: u64,
}

impl Pool {
    /// Unused capacity
    #[must_use]
    pub fn free(&self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }

    /// `amount / capacity`, with an empty pool counting as fully consumed
    #[must_use]
    pub fn share_of(&self, amount: u64) -> f64 {
        if self.capacity == 0 {
            if amount == 0 { 0.0 } else { 1.0 }
        } else {
            amount as f64 / self.capacity as f64
        }
    }
}

/// Amount requested from one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    /// Pool
    pub pool: PoolKey,
    /// Amount
    pub amount: u64,
}

impl Demand {
    /// Create a demand
    #[must_use]
    pub fn new(pool: PoolKey, amount: u64) -> Self {
        Self { pool, amount }
    }
}

/// Snapshot of one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolUsage {
    /// Pool
    pub pool: PoolKey,
    /// Provisioned capacity
    pub capacity: u64,
    /// In use
    pub used: u64,
}

/// Share held in one pool by a grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Pool
    pub pool: PoolKey,
    /// Amount asked for
    pub requested: u64,
    /// Amount held
    pub granted: u64,
}

impl Share {
    /// Whether the full request is held
    #[must_use]
    pub fn met(&self) -> bool {
        self.granted >= self.requested
    }
}

/// Live grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant id
    pub id: GrantId,
    /// Per-pool shares
    pub shares: Vec<Share>,
    /// Arrival order
    pub seq: u64,
}

impl Grant {
    /// Every share fully held
    #[must_use]
    pub fn floor_met(&self) -> bool {
        self.shares.iter().all(Share::met)
    }

    /// Amount held in a pool
    #[must_use]
    pub fn granted_in(&self, pool: &PoolKey) -> u64 {
        self.shares
            .iter()
            .find(|s| &s.pool == pool)
            .map_or(0, |s| s.granted)
    }

    /// Amount held in the first pool of a dimension
    #[must_use]
    pub fn granted_of(&self, dimension: Dimension) -> u64 {
        self.shares
            .iter()
            .find(|s| s.pool.dimension == dimension)
            .map_or(0, |s| s.granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_share() {
        let pool = Pool { capacity: 200, used: 50 };
        assert_eq!(pool.free(), 150);
        assert_eq!(pool.share_of(100), 0.5);
        assert_eq!(Pool::default().share_of(1), 1.0);
        assert_eq!(Pool::default().share_of(0), 0.0);
    }

    #[test]
    fn test_pool_key_display() {
        let key = PoolKey::new("corridor-001", Dimension::Lanes);
        assert_eq!(key.to_string(), "corridor-001/lanes");
    }
}
