//! Corridor fabric lifecycle supervisor
//!
//! Drives corridors and memory bundles through their phase machine:
//! attestation gate, admission against the pool allocator, calibration,
//! then continuous supervision. Telemetry samples and fabric events (lane
//! loss, device drop) feed a failure policy that sheds traffic, backs off,
//! recovers or escalates. Every transition lands in an event journal.
//!
//! The supervisor owns no transport; wrap it in whatever API surface the
//! deployment needs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod events;
pub mod metrics;
pub mod policy;
pub mod resource;
pub mod supervisor;
pub mod tasks;

// Re-exports
pub use config::{BackoffPolicy, SupervisorConfig};
pub use events::{EventJournal, EventKind, LifecycleEvent};
pub use metrics::{Counters, MetricsSnapshot};
pub use policy::{DeviceReport, DropOutcome, ReconcileReport};
pub use resource::{
    BackoffState, BundleSpec, BundleState, CorridorQos, CorridorSpec, CorridorState, Observation,
    Resource, ResourceSpec, ResourceState, Telemetry,
};
pub use supervisor::Supervisor;
pub use tasks::MigrationTask;

#[cfg(test)]
mod scenarios;
