//! SLO counters.
//!
//! Only the metric names dashboards already scrape are exported; rendering
//! them in any particular exposition format is left to the transport.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters kept by the supervisor
#[derive(Debug, Default)]
pub struct Counters {
    corridor_allocations: AtomicU64,
    ffm_allocations: AtomicU64,
    errors: AtomicU64,
    migrations: AtomicU64,
}

impl Counters {
    /// Corridor admitted
    pub fn record_corridor(&self) {
        self.corridor_allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Bundle admitted
    pub fn record_bundle(&self) {
        self.ffm_allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Error returned to a caller
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Migration completed
    pub fn record_migration(&self) {
        self.migrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine with gauges into a snapshot
    #[must_use]
    pub fn snapshot(&self, corridor_bandwidth_gbps: u64, ffm_bandwidth_gbs: u64, attestations: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            corridor_allocations_total: self.corridor_allocations.load(Ordering::Relaxed),
            corridor_bandwidth_gbps,
            ffm_allocations_total: self.ffm_allocations.load(Ordering::Relaxed),
            ffm_bandwidth_gbps: ffm_bandwidth_gbs,
            attestations_total: attestations,
            errors_total: self.errors.load(Ordering::Relaxed),
            ffm_migrations_total: self.migrations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metric values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Corridors ever admitted
    pub corridor_allocations_total: u64,
    /// Achievable bandwidth of live corridors
    pub corridor_bandwidth_gbps: u64,
    /// Bundles ever admitted
    pub ffm_allocations_total: u64,
    /// Achieved bandwidth of live bundles (GB/s)
    pub ffm_bandwidth_gbps: u64,
    /// Tickets issued
    pub attestations_total: u64,
    /// Errors returned to callers
    pub errors_total: u64,
    /// Completed latency class migrations
    pub ffm_migrations_total: u64,
}

impl MetricsSnapshot {
    /// Named samples
    #[must_use]
    pub fn samples(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("corridoros_corridor_allocations_total", self.corridor_allocations_total),
            ("corridoros_corridor_bandwidth_gbps", self.corridor_bandwidth_gbps),
            ("corridoros_ffm_allocations_total", self.ffm_allocations_total),
            ("corridoros_ffm_bandwidth_gbps", self.ffm_bandwidth_gbps),
            ("corridoros_attestations_total", self.attestations_total),
            ("corridoros_errors_total", self.errors_total),
            ("ffm_migrations_total", self.ffm_migrations_total),
        ]
    }
}
