//! Background work: latency class migrations and the reconciler loop.

use crate::events::EventKind;
use crate::resource::{PAGES_PER_MIGRATION, Resource, ResourceSpec};
use crate::supervisor::{Entry, Supervisor, bundle_demands, expired, require_settled};
use corridor_alloc::{AdmissionRequest, Dimension};
use corridor_core::{FabricError, FabricResult, GrantId, LatencyClass, ResourceId};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Handle on a running latency class migration
#[derive(Debug)]
pub struct MigrationTask {
    /// Bundle being moved
    pub resource: ResourceId,
    /// Tier it is moving to
    pub target: LatencyClass,
    handle: JoinHandle<FabricResult<Resource>>,
}

impl MigrationTask {
    /// Wait for the migration to finish
    ///
    /// # Errors
    ///
    /// Returns the migration's own error, or `Internal` if the task panicked
    /// or was aborted
    pub async fn wait(self) -> FabricResult<Resource> {
        self.handle.await.map_err(|e| FabricError::Internal {
            message: format!("migration task: {e}"),
        })?
    }

    /// Whether the migration has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Supervisor {
    /// Move a bundle to another latency class.
    ///
    /// Returns as soon as the migration is submitted; the move itself runs
    /// in the background and the bundle keeps serving from its current tier
    /// until it completes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `InvalidArgument` for a
    /// corridor, an unsettled bundle, a migration already in flight or an
    /// unchanged tier, `AttestationInvalid` while the ticket is expired and
    /// `Unavailable` when no active device serves the target tier
    pub async fn adjust_latency_class(&self, id: &ResourceId, target: LatencyClass) -> FabricResult<MigrationTask> {
        self.start_migration(id, target)
            .await
            .inspect_err(|_| self.inner.counters.record_error())
    }

    async fn start_migration(&self, id: &ResourceId, target: LatencyClass) -> FabricResult<MigrationTask> {
        let entry = self.entry(id).await?;
        {
            let mut resource = entry.resource.lock().await;
            let now = self.now();
            require_settled(&resource)?;
            if resource.ticket_expired(now) {
                return Err(expired(&resource));
            }
            let Some(bundle) = resource.bundle() else {
                return Err(FabricError::invalid("resource", format!("{id} is not a memory bundle")));
            };
            if bundle.migrating {
                return Err(FabricError::invalid("latency_class", format!("{id} is already migrating")));
            }
            let from = bundle.latency_class;
            if from == target {
                return Err(FabricError::invalid("latency_class", format!("{id} is already {target}")));
            }
            self.pick_memory_device(target, resource.device.as_ref(), false).await?;

            if let Some(b) = resource.bundle_mut() {
                b.migrating = true;
            }
            info!(resource = %id, %from, to = %target, "latency class migration started");
            self.inner
                .journal
                .record(now, Some(id), EventKind::MigrationStarted { from, to: target })
                .await;
        }

        let supervisor = self.clone();
        let delay = Duration::from_millis(self.inner.config.migration_ms);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            supervisor.finish_migration(&entry, target).await
        });
        Ok(MigrationTask {
            resource: id.clone(),
            target,
            handle,
        })
    }

    async fn finish_migration(&self, entry: &Entry, target: LatencyClass) -> FabricResult<Resource> {
        let mut resource = entry.resource.lock().await;
        let result = self.migrate(&mut resource, target).await;
        if let Some(b) = resource.bundle_mut() {
            b.migrating = false;
        }
        match result {
            Ok(()) => Ok(resource.clone()),
            Err(err) => {
                self.inner.counters.record_error();
                warn!(resource = %resource.id, error = %err, "latency class migration failed");
                Err(err)
            }
        }
    }

    async fn migrate(&self, resource: &mut Resource, target: LatencyClass) -> FabricResult<()> {
        require_settled(resource)?;
        let ResourceSpec::MemoryBundle(mut spec) = resource.spec.clone() else {
            return Err(FabricError::invalid("resource", format!("{} is not a memory bundle", resource.id)));
        };
        let device = self
            .pick_memory_device(target, resource.device.as_ref(), false)
            .await?;

        let generation = resource.generation + 1;
        let grant = GrantId::for_resource(&resource.id, generation);
        let admission = self
            .inner
            .allocator
            .admit(AdmissionRequest {
                grant_id: grant.clone(),
                demands: bundle_demands(&device.id, &spec),
                floor_mandatory: spec.floor_mandatory,
            })
            .await?;
        if let Some(old) = resource.grant.replace(grant) {
            self.inner.allocator.release(&old).await;
        }

        spec.latency_class = target;
        resource.spec = ResourceSpec::MemoryBundle(spec);
        resource.generation = generation;
        resource.device = Some(device.id.clone());
        resource.floor_met = admission.floor_met;
        resource.dominant_share = admission.dominant_share;
        let moved_pages = match resource.bundle_mut() {
            Some(b) => {
                b.latency_class = target;
                b.achieved_gbs = admission.granted_of(Dimension::Bandwidth);
                b.moved_pages += PAGES_PER_MIGRATION;
                b.moved_pages
            }
            None => 0,
        };
        self.inner.counters.record_migration();

        let now = self.now();
        resource.updated_at = now;
        info!(resource = %resource.id, device = %device.id, tier = %target, moved_pages, "latency class migration completed");
        self.inner
            .journal
            .record(
                now,
                Some(&resource.id),
                EventKind::MigrationCompleted {
                    tier: target,
                    moved_pages,
                },
            )
            .await;
        self.assess(resource, now, "migrated with a short floor").await;
        Ok(())
    }

    /// Run [`Supervisor::reconcile`] every `interval` until the handle is
    /// aborted
    #[must_use]
    pub fn spawn_reconciler(&self, interval: Duration) -> JoinHandle<()> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = supervisor.reconcile().await;
                if !report.escalated.is_empty() {
                    warn!(escalated = ?report.escalated, "resources failed by the reconciler");
                } else if !report.is_empty() {
                    debug!(?report, "reconciler tick");
                }
            }
        })
    }
}
