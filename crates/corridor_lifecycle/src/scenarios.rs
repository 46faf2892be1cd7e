//! End-to-end lifecycle tests against a manual clock.

use crate::config::SupervisorConfig;
use crate::events::EventKind;
use crate::policy::DropOutcome;
use crate::resource::{BundleSpec, CorridorSpec, Observation, ResourceSpec};
use crate::supervisor::Supervisor;
use corridor_alloc::{Allocator, Dimension, LaneLoss, PoolKey};
use corridor_attest::baseline::digest;
use corridor_attest::{AttestConfig, AttestationRequest, AttestationVerifier, Baseline};
use corridor_calibrate::{CalibrationConfig, CalibrationEngine, NoiseModel};
use corridor_core::{
    DeviceId, ErrorCode, LatencyClass, ManualClock, Phase, ResourceId, SharedClock, TicketId,
    Timestamp,
};
use corridor_inventory::{Device, FabricInventory};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

const FIRMWARE: &[u8] = b"corridor-fw-2.4.1";
const CONFIG: &[u8] = b"lanes=8;grid=50GHz";
const GIB: u64 = 1 << 30;

struct Fabric {
    sup: Supervisor,
    clock: Arc<ManualClock>,
    verifier: Arc<AttestationVerifier>,
}

impl Fabric {
    fn new(config: SupervisorConfig) -> Self {
        Self::with_attest(config, AttestConfig::default())
    }

    fn with_attest(config: SupervisorConfig, attest: AttestConfig) -> Self {
        let clock = ManualClock::shared(Timestamp::from_millis(1_000_000));
        let shared: SharedClock = clock.clone();
        let inventory = Arc::new(FabricInventory::new(shared.clone()));
        let verifier = Arc::new(AttestationVerifier::new(attest, shared.clone()).unwrap());
        let engine = CalibrationEngine::new(CalibrationConfig::default().with_noise(NoiseModel::Disabled));
        let sup = Supervisor::new(config, inventory, Allocator::new(), verifier.clone(), engine, shared);
        Self { sup, clock, verifier }
    }

    async fn ticket(&self, device: &str) -> TicketId {
        self.verifier
            .register_baseline(DeviceId::new(device), Baseline::from_images(FIRMWARE, CONFIG))
            .await;
        self.verifier
            .attest(AttestationRequest::new(device, digest(FIRMWARE), digest(CONFIG)))
            .await
            .id
    }

    async fn corridor(&self, device: &str) -> ResourceId {
        let ticket = self.ticket(device).await;
        let spec = CorridorSpec::new(device).with_ticket(ticket);
        self.sup.allocate(ResourceSpec::Corridor(spec)).await.unwrap().id
    }

    fn advance(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }
}

fn bundle(bytes: u64, tier: LatencyClass, floor: u64) -> ResourceSpec {
    ResourceSpec::MemoryBundle(BundleSpec::new(bytes, tier, floor))
}

#[tokio::test]
async fn test_corridor_ready_with_floor_met() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();

    let id = fabric.corridor("c1").await;
    let corridor = fabric.sup.get(&id).await.unwrap();
    assert_eq!(corridor.phase, Phase::Ready);
    assert!(corridor.floor_met);
    let state = corridor.corridor().unwrap();
    assert_eq!(state.lanes, 8);
    assert_eq!(state.wavelengths_nm, (1550..=1557).collect::<Vec<_>>());
    assert_eq!(state.achievable_gbps, 416);
    assert!(state.achievable_gbps >= 400);
    assert!(state.ber <= 1.1e-12);
    assert!(fabric.sup.is_ready(&id).await);

    let telemetry = fabric.sup.get_telemetry(&id).await.unwrap();
    assert_eq!(telemetry.temperature_c, 47.5);
    assert_eq!(telemetry.power, 0.9);

    let metrics = fabric.sup.metrics().await;
    assert_eq!(metrics.corridor_allocations_total, 1);
    assert_eq!(metrics.corridor_bandwidth_gbps, 416);
    assert_eq!(metrics.attestations_total, 1);
}

#[tokio::test]
async fn test_bundle_best_effort_then_recovers() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric
        .sup
        .provision_device(Device::memory("m2", 1024 * GIB, 250, LatencyClass::T2))
        .await
        .unwrap();

    let first = fabric.sup.allocate(bundle(64 * GIB, LatencyClass::T2, 150)).await.unwrap();
    assert_eq!(first.phase, Phase::Ready);

    let second = fabric.sup.allocate(bundle(256 * GIB, LatencyClass::T2, 150)).await.unwrap();
    assert_eq!(second.phase, Phase::Degraded);
    assert!(!second.floor_met);
    assert_eq!(second.bundle().unwrap().achieved_gbs, 100);

    fabric.sup.release(&first.id).await.unwrap();
    fabric.advance(100);
    let report = fabric.sup.reconcile().await;
    assert_eq!(report.attempts, vec![second.id.clone()]);
    let regrown = fabric.sup.get(&second.id).await.unwrap();
    assert!(regrown.floor_met);
    assert_eq!(regrown.phase, Phase::Degraded);

    fabric.advance(5_000);
    let report = fabric.sup.reconcile().await;
    assert_eq!(report.recovered, vec![second.id.clone()]);
    assert!(fabric.sup.is_ready(&second.id).await);
}

#[tokio::test]
async fn test_partial_lane_corridor_regrows_and_recovers() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();

    let narrow = CorridorSpec::new("c1")
        .with_lanes(4, (1550..=1553).collect())
        .with_floor(200)
        .without_attestation();
    let first = fabric.sup.allocate(ResourceSpec::Corridor(narrow)).await.unwrap();
    assert_eq!(first.phase, Phase::Ready);

    let wide = CorridorSpec::new("c1").without_attestation();
    let second = fabric.sup.allocate(ResourceSpec::Corridor(wide)).await.unwrap();
    assert_eq!(second.phase, Phase::Degraded);
    assert!(!second.floor_met);
    let state = second.corridor().unwrap();
    assert_eq!(state.lanes, 4);
    assert_eq!(state.wavelengths_nm, vec![1554, 1555, 1556, 1557]);
    assert_eq!(state.achievable_gbps, 208);

    fabric.sup.release(&first.id).await.unwrap();
    fabric.advance(100);
    let report = fabric.sup.reconcile().await;
    assert_eq!(report.attempts, vec![second.id.clone()]);

    let regrown = fabric.sup.get(&second.id).await.unwrap();
    assert!(regrown.floor_met);
    assert_eq!(regrown.phase, Phase::Degraded);
    let state = regrown.corridor().unwrap();
    assert_eq!(state.lanes, 8);
    assert_eq!(state.wavelengths_nm, (1550..=1557).collect::<Vec<_>>());
    assert_eq!(state.achievable_gbps, 416);
    assert_eq!(state.effective_floor_gbps, 400);
    assert!(state.calibration.as_ref().is_some_and(|c| c.bias_voltages.len() == 8));

    let lanes = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("c1", Dimension::Lanes))
        .await
        .unwrap();
    assert_eq!(lanes.used, 8);
    let bandwidth = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("c1", Dimension::Bandwidth))
        .await
        .unwrap();
    assert_eq!(bandwidth.used, 400);

    fabric.advance(5_000);
    let report = fabric.sup.reconcile().await;
    assert_eq!(report.recovered, vec![second.id.clone()]);
    assert!(fabric.sup.is_ready(&second.id).await);
}

#[tokio::test]
async fn test_ber_drift_escalates_after_timeout() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let id = fabric.corridor("c1").await;

    let drifted = fabric.sup.observe(&id, Observation::ber(1e-9)).await.unwrap();
    assert_eq!(drifted.phase, Phase::Degraded);
    let state = drifted.corridor().unwrap();
    assert_eq!(state.best_effort_share, 0.5);
    assert!(!state.surplus_enabled);

    let mut failed_at = None;
    for tick in 1..=650u64 {
        fabric.advance(100);
        fabric.sup.observe(&id, Observation::ber(1e-9)).await.unwrap();
        let report = fabric.sup.reconcile().await;
        if !report.escalated.is_empty() && failed_at.is_none() {
            failed_at = Some(tick * 100);
        }
    }
    assert_eq!(failed_at, Some(60_000));

    let failed = fabric.sup.get(&id).await.unwrap();
    assert_eq!(failed.phase, Phase::Failed);
    assert_eq!(failed.last_error.unwrap().code, ErrorCode::Unavailable);

    let events = fabric.sup.journal().history_of(&id).await;
    let delays: Vec<u64> = events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::BackoffAttempt { delay_ms, .. } => Some(delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(&delays[..6], &[100, 200, 400, 800, 1_600, 1_600]);
    assert!(events.iter().any(|e| matches!(e.kind, EventKind::RedAlert { .. })));

    // Shares went back to the pool.
    let lanes = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("c1", Dimension::Lanes))
        .await
        .unwrap();
    assert_eq!(lanes.used, 0);
}

#[tokio::test]
async fn test_device_drop_fails_corridor() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let id = fabric.corridor("c1").await;

    let report = fabric.sup.set_device_state(&DeviceId::new("c1"), "disabled").await.unwrap();
    assert_eq!(report.affected.len(), 1);
    assert!(matches!(&report.affected[0], DropOutcome::Failed { resource, .. } if resource == &id));

    let corridor = fabric.sup.get(&id).await.unwrap();
    assert_eq!(corridor.phase, Phase::Failed);
    assert!(!fabric.sup.is_ready(&id).await);

    // A disabled device takes no new corridors.
    let ticket = fabric.ticket("c1").await;
    let err = fabric
        .sup
        .allocate(ResourceSpec::Corridor(CorridorSpec::new("c1").with_ticket(ticket)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unavailable);
}

#[tokio::test]
async fn test_attestation_gate() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    fabric.sup.provision_device(Device::corridor("c2", 8, 500)).await.unwrap();

    let err = fabric
        .sup
        .allocate(ResourceSpec::Corridor(CorridorSpec::new("c1")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AttestationRequired);

    let other = fabric.ticket("c2").await;
    let err = fabric
        .sup
        .allocate(ResourceSpec::Corridor(CorridorSpec::new("c1").with_ticket(other)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AttestationInvalid);

    // Claims for a device without a baseline never validate.
    let untrusted = fabric
        .verifier
        .attest(AttestationRequest::new("c1", digest(FIRMWARE), digest(CONFIG)))
        .await;
    assert!(!untrusted.valid);

    assert!(fabric.sup.list().await.is_empty());
    assert_eq!(fabric.sup.metrics().await.errors_total, 2);
}

#[tokio::test]
async fn test_mandatory_floor_rejected_without_change() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric
        .sup
        .provision_device(Device::memory("m1", 512 * GIB, 100, LatencyClass::T1))
        .await
        .unwrap();

    let spec = BundleSpec::new(64 * GIB, LatencyClass::T1, 150).mandatory();
    let err = fabric.sup.allocate(ResourceSpec::MemoryBundle(spec)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CapacityExceeded);

    for usage in fabric.sup.allocator().usage().await {
        assert_eq!(usage.used, 0);
    }
    assert!(fabric.sup.list().await.is_empty());
}

#[tokio::test]
async fn test_release_is_idempotent_and_frees_shares() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let id = fabric.corridor("c1").await;

    let released = fabric.sup.release(&id).await.unwrap().unwrap();
    assert_eq!(released.phase, Phase::Releasing);
    assert!(fabric.sup.release(&id).await.unwrap().is_none());
    assert!(fabric.sup.release(&ResourceId::new("cor-missing")).await.unwrap().is_none());
    assert_eq!(fabric.sup.get(&id).await.unwrap_err().code(), ErrorCode::NotFound);

    let bandwidth = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("c1", Dimension::Bandwidth))
        .await
        .unwrap();
    assert_eq!(bandwidth.used, 0);

    // The same 8 lanes are available again.
    let again = fabric.corridor("c1").await;
    assert!(fabric.sup.is_ready(&again).await);
}

#[tokio::test]
async fn test_cancel_pending_and_settled() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric
        .sup
        .provision_device(Device::memory("m1", 512 * GIB, 100, LatencyClass::T1))
        .await
        .unwrap();

    let pending = fabric.sup.submit(bundle(GIB, LatencyClass::T1, 10)).await.unwrap();
    fabric.sup.cancel(&pending).await.unwrap();
    assert_eq!(fabric.sup.drive(&pending).await.unwrap_err().code(), ErrorCode::NotFound);
    let events = fabric.sup.journal().history_of(&pending).await;
    assert!(events.iter().any(|e| e.kind == EventKind::Cancelled));

    let ready = fabric.sup.allocate(bundle(GIB, LatencyClass::T1, 10)).await.unwrap();
    let err = fabric.sup.cancel(&ready.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(fabric.sup.is_ready(&ready.id).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_admission_leaves_no_share() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let spec = ResourceSpec::Corridor(CorridorSpec::new("c1").without_attestation());

    for _ in 0..200 {
        let id = fabric.sup.submit(spec.clone()).await.unwrap();
        let driver = tokio::spawn({
            let sup = fabric.sup.clone();
            let id = id.clone();
            async move { sup.drive(&id).await }
        });
        let canceller = tokio::spawn({
            let sup = fabric.sup.clone();
            let id = id.clone();
            async move { sup.cancel(&id).await }
        });
        let driven = driver.await.unwrap();
        let cancel = canceller.await.unwrap();

        match driven {
            Ok(resource) => {
                assert_eq!(resource.phase, Phase::Ready);
                assert_eq!(cancel.unwrap_err().code(), ErrorCode::InvalidArgument);
                fabric.sup.release(&id).await.unwrap();
            }
            Err(err) => {
                assert!(matches!(err.code(), ErrorCode::Cancelled | ErrorCode::NotFound));
                assert!(cancel.is_ok() || cancel.unwrap_err().code() == ErrorCode::NotFound);
                assert_eq!(fabric.sup.get(&id).await.unwrap_err().code(), ErrorCode::NotFound);
                let events = fabric.sup.journal().history_of(&id).await;
                assert!(events.iter().any(|e| e.kind == EventKind::Cancelled));
            }
        }
        for usage in fabric.sup.allocator().usage().await {
            assert_eq!(usage.used, 0, "{}", usage.pool);
        }
    }
    assert!(fabric.sup.list().await.is_empty());
}

#[tokio::test]
async fn test_cancel_flagged_before_admission_rolls_back() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let id = fabric
        .sup
        .submit(ResourceSpec::Corridor(CorridorSpec::new("c1").without_attestation()))
        .await
        .unwrap();

    // Flagged the way a concurrent cancel flags it; admission checks it at every step.
    let entry = fabric.sup.entry(&id).await.unwrap();
    entry.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
    let err = fabric.sup.drive(&id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);

    // The entry the canceller still holds reads as cancelled, not as settled.
    let resource = entry.resource.lock().await;
    assert_eq!(resource.phase, Phase::Releasing);
    assert!(resource.grant.is_none());
    drop(resource);
    assert_eq!(fabric.sup.drive(&id).await.unwrap_err().code(), ErrorCode::NotFound);
    for usage in fabric.sup.allocator().usage().await {
        assert_eq!(usage.used, 0);
    }
}

#[tokio::test]
async fn test_rejection_after_grant_returns_lanes_and_wavelengths() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();

    // The pools fit 450 Gbps but eight lanes only carry 416.
    let mut spec = CorridorSpec::new("c1").with_floor(450).without_attestation();
    spec.floor_mandatory = true;
    let err = fabric.sup.allocate(ResourceSpec::Corridor(spec)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CapacityExceeded);

    for usage in fabric.sup.allocator().usage().await {
        assert_eq!(usage.used, 0);
    }
    assert!(fabric.sup.list().await.is_empty());
    let id = fabric
        .sup
        .allocate(ResourceSpec::Corridor(CorridorSpec::new("c1").without_attestation()))
        .await
        .unwrap()
        .id;
    let corridor = fabric.sup.get(&id).await.unwrap();
    assert_eq!(corridor.corridor().unwrap().wavelengths_nm, (1550..=1557).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_share_the_device() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sup = fabric.sup.clone();
            let spec = CorridorSpec::new("c1")
                .with_lanes(3, vec![1550, 1551, 1552])
                .with_floor(100)
                .without_attestation();
            tokio::spawn(async move { sup.allocate(ResourceSpec::Corridor(spec)).await })
        })
        .collect();
    let mut corridors = Vec::new();
    for result in join_all(handles).await {
        corridors.push(result.unwrap().unwrap());
    }

    let lanes: u32 = corridors.iter().map(|c| c.corridor().unwrap().lanes).sum();
    assert_eq!(lanes, 8);
    let mut lit: Vec<u32> = corridors
        .iter()
        .flat_map(|c| c.corridor().unwrap().wavelengths_nm.clone())
        .collect();
    lit.sort_unstable();
    let count = lit.len();
    lit.dedup();
    assert_eq!(lit.len(), count);
    assert_eq!(lit, (1550..=1557).collect::<Vec<_>>());

    for usage in fabric.sup.allocator().usage().await {
        assert!(usage.used <= usage.capacity, "{}", usage.pool);
    }
    let lane_pool = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("c1", Dimension::Lanes))
        .await
        .unwrap();
    assert_eq!(lane_pool.used, 8);
    assert_eq!(fabric.sup.list().await.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ensure_admits_once() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let id = ResourceId::new("cor-shared");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sup = fabric.sup.clone();
            let id = id.clone();
            let spec = ResourceSpec::Corridor(CorridorSpec::new("c1").without_attestation());
            tokio::spawn(async move { sup.ensure(id, spec).await })
        })
        .collect();
    for result in join_all(handles).await {
        let resource = result.unwrap().unwrap();
        assert_eq!(resource.id, id);
        assert_eq!(resource.phase, Phase::Ready);
    }

    assert_eq!(fabric.sup.metrics().await.corridor_allocations_total, 1);
    let lane_pool = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("c1", Dimension::Lanes))
        .await
        .unwrap();
    assert_eq!(lane_pool.used, 8);
}

#[tokio::test]
async fn test_ensure_is_idempotent() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric
        .sup
        .provision_device(Device::memory("m1", 512 * GIB, 100, LatencyClass::T1))
        .await
        .unwrap();

    let id = ResourceId::new("ffm-cache");
    let first = fabric.sup.ensure(id.clone(), bundle(GIB, LatencyClass::T1, 40)).await.unwrap();
    let second = fabric.sup.ensure(id.clone(), bundle(GIB, LatencyClass::T1, 40)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(fabric.sup.metrics().await.ffm_allocations_total, 1);
    assert!(fabric.sup.all_ready(&[id]).await);
    assert!(!fabric.sup.all_ready(&[ResourceId::new("ffm-missing")]).await);
}

#[tokio::test]
async fn test_bundle_fails_over_to_nearest_tier() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric
        .sup
        .provision_device(Device::memory("m1", 512 * GIB, 200, LatencyClass::T1))
        .await
        .unwrap();
    fabric
        .sup
        .provision_device(Device::memory("m3", 512 * GIB, 200, LatencyClass::T3))
        .await
        .unwrap();
    fabric
        .sup
        .provision_device(Device::memory("m2", 512 * GIB, 200, LatencyClass::T2))
        .await
        .unwrap();

    let ready = fabric.sup.allocate(bundle(128 * GIB, LatencyClass::T1, 100)).await.unwrap();
    assert_eq!(ready.device, Some(DeviceId::new("m1")));

    let report = fabric.sup.set_device_state(&DeviceId::new("m1"), "disabled").await.unwrap();
    assert_eq!(
        report.affected,
        vec![DropOutcome::FailedOver {
            resource: ready.id.clone(),
            to: DeviceId::new("m2"),
            tier: LatencyClass::T2,
        }]
    );

    let moved = fabric.sup.get(&ready.id).await.unwrap();
    assert_eq!(moved.phase, Phase::Ready);
    assert_eq!(moved.generation, 1);
    assert_eq!(moved.bundle().unwrap().latency_class, LatencyClass::T2);
    let old = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("m1", Dimension::Bandwidth))
        .await
        .unwrap();
    assert_eq!(old.used, 0);
}

#[tokio::test]
async fn test_latency_class_migration() {
    let fabric = Fabric::new(SupervisorConfig::default().with_migration_time(0));
    fabric
        .sup
        .provision_device(Device::memory("m2", 512 * GIB, 200, LatencyClass::T2))
        .await
        .unwrap();
    fabric
        .sup
        .provision_device(Device::memory("m0", 256 * GIB, 400, LatencyClass::T0))
        .await
        .unwrap();

    let ready = fabric.sup.allocate(bundle(64 * GIB, LatencyClass::T2, 100)).await.unwrap();
    let task = fabric.sup.adjust_latency_class(&ready.id, LatencyClass::T0).await.unwrap();
    assert_eq!(task.target, LatencyClass::T0);

    let moved = task.wait().await.unwrap();
    let state = moved.bundle().unwrap();
    assert_eq!(state.latency_class, LatencyClass::T0);
    assert_eq!(state.moved_pages, 1_000_000);
    assert!(!state.migrating);
    assert_eq!(moved.device, Some(DeviceId::new("m0")));
    assert_eq!(fabric.sup.metrics().await.ffm_migrations_total, 1);

    let err = fabric
        .sup
        .adjust_latency_class(&ready.id, LatencyClass::T0)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let err = fabric
        .sup
        .adjust_latency_class(&ready.id, LatencyClass::T3)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unavailable);
}

#[tokio::test]
async fn test_lost_wavelength_remaps_then_shrinks() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric
        .sup
        .provision_device(Device::corridor("c1", 8, 500).with_spares(1))
        .await
        .unwrap();
    let id = fabric.corridor("c1").await;
    let device = DeviceId::new("c1");

    let loss = fabric.sup.report_wavelength_loss(&device, 1550).await.unwrap();
    assert!(matches!(loss, LaneLoss::Remapped { from: 1550, to: 1558, .. }));
    let corridor = fabric.sup.get(&id).await.unwrap();
    assert!(corridor.corridor().unwrap().wavelengths_nm.contains(&1558));
    assert_eq!(corridor.phase, Phase::Ready);

    let loss = fabric.sup.report_wavelength_loss(&device, 1551).await.unwrap();
    assert!(matches!(loss, LaneLoss::Shrunk { lost: 1551, lanes: 7, .. }));
    let corridor = fabric.sup.get(&id).await.unwrap();
    let state = corridor.corridor().unwrap();
    assert_eq!(state.lanes, 7);
    assert_eq!(state.achievable_gbps, 364);
    assert_eq!(state.effective_floor_gbps, 364);
    assert_eq!(corridor.phase, Phase::Ready);

    // The lowered floor is what the pool holds for it now.
    let bandwidth = fabric
        .sup
        .allocator()
        .pool_usage(&PoolKey::new("c1", Dimension::Bandwidth))
        .await
        .unwrap();
    assert_eq!(bandwidth.used, 364);

    let events = fabric.sup.journal().history_of(&id).await;
    assert!(events.iter().any(|e| matches!(e.kind, EventKind::LanesShrunk { lanes: 7, .. })));
}

#[tokio::test]
async fn test_expired_ticket_blocks_changes_until_reattested() {
    let attest = AttestConfig::default().with_ticket_ttl(10_000);
    let fabric = Fabric::with_attest(SupervisorConfig::default(), attest);
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let id = fabric.corridor("c1").await;

    fabric.advance(11_000);
    let err = fabric.sup.adjust_bandwidth_floor(&id, 300).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AttestationInvalid);

    let stale = fabric.sup.get(&id).await.unwrap().ticket.unwrap();
    let err = fabric.sup.reattest(&id, &stale).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AttestationInvalid);

    let fresh = fabric.ticket("c1").await;
    let renewed = fabric.sup.reattest(&id, &fresh).await.unwrap();
    assert_eq!(renewed.ticket, Some(fresh));

    let adjusted = fabric.sup.adjust_bandwidth_floor(&id, 300).await.unwrap();
    assert_eq!(adjusted.spec.floor(), 300);
    assert_eq!(adjusted.phase, Phase::Ready);
}

#[tokio::test]
async fn test_expired_ticket_blocks_recovery() {
    let attest = AttestConfig::default().with_ticket_ttl(10_000);
    let fabric = Fabric::with_attest(SupervisorConfig::default(), attest);
    fabric.sup.provision_device(Device::corridor("c1", 8, 500)).await.unwrap();
    let id = fabric.corridor("c1").await;

    fabric.sup.observe(&id, Observation::achieved(200)).await.unwrap();
    assert!(!fabric.sup.is_ready(&id).await);
    fabric.sup.observe(&id, Observation::achieved(416)).await.unwrap();

    fabric.advance(11_000);
    let report = fabric.sup.reconcile().await;
    assert_eq!(report.blocked, vec![id.clone()]);
    let events = fabric.sup.journal().history_of(&id).await;
    assert!(events.iter().any(|e| matches!(e.kind, EventKind::AttestationExpired { .. })));
}

#[tokio::test]
async fn test_raising_floor_past_capacity_degrades() {
    let fabric = Fabric::new(SupervisorConfig::default());
    fabric
        .sup
        .provision_device(Device::memory("m1", 512 * GIB, 200, LatencyClass::T1))
        .await
        .unwrap();
    let ready = fabric.sup.allocate(bundle(GIB, LatencyClass::T1, 100)).await.unwrap();

    let raised = fabric.sup.adjust_bandwidth_floor(&ready.id, 300).await.unwrap();
    assert_eq!(raised.phase, Phase::Degraded);
    assert!(!raised.floor_met);
    assert_eq!(raised.bundle().unwrap().achieved_gbs, 200);

    let lowered = fabric.sup.adjust_bandwidth_floor(&ready.id, 150).await.unwrap();
    assert!(lowered.floor_met);
    assert!(lowered.healthy_since.is_some());
}
