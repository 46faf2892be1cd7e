//! Lifecycle event journal.
//!
//! Every phase change and failure-policy action is published on a broadcast
//! channel and kept in a bounded history for late readers.

use corridor_core::{DeviceId, LatencyClass, Phase, ResourceId, TicketId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::{Mutex, broadcast};

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// Phase transition
    PhaseChanged {
        /// Old phase
        from: Phase,
        /// New phase
        to: Phase,
        /// Why
        reason: String,
    },
    /// Calibration finished
    Calibrated {
        /// Tolerance met
        converged: bool,
        /// Final BER
        final_ber: f64,
        /// Iterations spent
        iterations: u32,
    },
    /// Non-critical traffic share halved after BER drift
    TrafficShed {
        /// Share now admitted
        best_effort_share: f64,
    },
    /// Recovery attempt under back-off
    BackoffAttempt {
        /// One-based attempt number
        attempt: u32,
        /// Delay that preceded this attempt
        delay_ms: u64,
    },
    /// Degraded past the escalation timeout
    RedAlert {
        /// Time spent Degraded
        degraded_for_ms: u64,
    },
    /// Lost wavelength replaced by a spare
    WavelengthRemapped {
        /// Device
        device: DeviceId,
        /// Lost wavelength
        from: u32,
        /// Spare
        to: u32,
    },
    /// Lost wavelength with no spare; lane count reduced
    LanesShrunk {
        /// Device
        device: DeviceId,
        /// Lost wavelength
        lost: u32,
        /// Lanes left
        lanes: u32,
        /// Floor now honoured
        floor_gbps: u64,
    },
    /// Bandwidth floor changed
    FloorAdjusted {
        /// Previous floor
        from: u64,
        /// New floor
        to: u64,
        /// New floor fully held
        met: bool,
    },
    /// Device went away
    DeviceDropped {
        /// Device
        device: DeviceId,
    },
    /// Device answered re-enumeration
    DeviceRecovered {
        /// Device
        device: DeviceId,
    },
    /// Bundle moved off a dropped device
    FailedOver {
        /// Old device
        from: DeviceId,
        /// New device
        to: DeviceId,
        /// New tier
        tier: LatencyClass,
    },
    /// Latency class migration submitted
    MigrationStarted {
        /// Current tier
        from: LatencyClass,
        /// Target tier
        to: LatencyClass,
    },
    /// Latency class migration done
    MigrationCompleted {
        /// New tier
        tier: LatencyClass,
        /// Total pages moved
        moved_pages: u64,
    },
    /// Ticket replaced
    Reattested {
        /// New ticket
        ticket: TicketId,
    },
    /// Transition blocked by an expired ticket
    AttestationExpired {
        /// Expired ticket
        ticket: Option<TicketId>,
    },
    /// Pending or Allocating request abandoned
    Cancelled,
    /// Pool shares returned and resource removed
    Released,
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Position in the journal
    pub seq: u64,
    /// When
    pub at: Timestamp,
    /// Subject resource, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceId>,
    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

struct History {
    next_seq: u64,
    events: VecDeque<LifecycleEvent>,
}

/// Broadcast journal with bounded history
pub struct EventJournal {
    tx: broadcast::Sender<LifecycleEvent>,
    history: Mutex<History>,
    capacity: usize,
}

impl EventJournal {
    /// Journal keeping the last `capacity` events
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self {
            tx,
            history: Mutex::new(History {
                next_seq: 0,
                events: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Append and publish an event
    pub async fn record(&self, at: Timestamp, resource: Option<&ResourceId>, kind: EventKind) -> u64 {
        let mut history = self.history.lock().await;
        let event = LifecycleEvent {
            seq: history.next_seq,
            at,
            resource: resource.cloned(),
            kind,
        };
        history.next_seq += 1;
        if self.capacity > 0 {
            if history.events.len() == self.capacity {
                history.events.pop_front();
            }
            history.events.push_back(event.clone());
        }
        // No subscribers is fine.
        let _ = self.tx.send(event.clone());
        event.seq
    }

    /// Subscribe to future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Retained history, oldest first
    pub async fn history(&self) -> Vec<LifecycleEvent> {
        self.history.lock().await.events.iter().cloned().collect()
    }

    /// Retained events about one resource
    pub async fn history_of(&self, resource: &ResourceId) -> Vec<LifecycleEvent> {
        self.history
            .lock()
            .await
            .events
            .iter()
            .filter(|e| e.resource.as_ref() == Some(resource))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for EventJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventJournal")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_is_bounded() {
        let journal = EventJournal::new(2);
        let id = ResourceId::new("cor-1");
        for _ in 0..3 {
            journal.record(Timestamp::EPOCH, Some(&id), EventKind::Released).await;
        }
        let history = journal.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].seq, 1);
        assert_eq!(history[1].seq, 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_events() {
        let journal = EventJournal::new(8);
        let mut rx = journal.subscribe();
        journal
            .record(
                Timestamp::from_millis(5),
                None,
                EventKind::DeviceDropped {
                    device: DeviceId::new("c1"),
                },
            )
            .await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.at, Timestamp::from_millis(5));
        assert!(matches!(event.kind, EventKind::DeviceDropped { .. }));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "device_dropped");
        assert_eq!(json["device"], "c1");
    }

    #[tokio::test]
    async fn test_history_of_filters_by_resource() {
        let journal = EventJournal::new(8);
        let a = ResourceId::new("a");
        let b = ResourceId::new("b");
        journal.record(Timestamp::EPOCH, Some(&a), EventKind::Cancelled).await;
        journal.record(Timestamp::EPOCH, Some(&b), EventKind::Released).await;
        let events = journal.history_of(&b).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Released);
    }
}
