//! Lifecycle phase machine shared by corridors and memory bundles.
//!
//! ```text
//! Pending ──► Allocating ──► Ready ◄──► Degraded
//!    │            │            │           │
//!    └────────────┴─────┬──────┴───────────┘
//!                       ▼
//!                    Failed ──► Releasing ──► (removed)
//! ```
//!
//! `Releasing` is reachable from every other phase; it is the only way out
//! of `Failed`.

use crate::error::{FabricError, FabricResult};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a fabric resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Created, waiting for the attestation check
    Pending,
    /// Attestation passed, admission in progress
    Allocating,
    /// Admitted with every floor met (and, for corridors, calibrated)
    Ready,
    /// Admitted but a floor or quality target is not met
    Degraded,
    /// Device gone or degraded past the escalation timeout
    Failed,
    /// Teardown in progress; pool shares are being returned
    Releasing,
}

impl Phase {
    /// Whether `self → next` is an allowed edge
    #[must_use]
    pub const fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Pending, Allocating | Failed | Releasing)
                | (Allocating, Ready | Degraded | Failed | Releasing)
                | (Ready, Degraded | Failed | Releasing)
                | (Degraded, Ready | Failed | Releasing)
                | (Failed, Releasing)
        )
    }

    /// Validate and return the next phase
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the edge is not in the machine.
    pub fn transition(self, next: Phase) -> FabricResult<Phase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(FabricError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether the resource currently holds pool shares
    #[must_use]
    pub const fn holds_shares(&self) -> bool {
        matches!(self, Self::Allocating | Self::Ready | Self::Degraded)
    }

    /// Whether the resource can still make progress without teardown
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Allocating | Self::Ready | Self::Degraded
        )
    }

    /// Phase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Allocating => "Allocating",
            Self::Ready => "Ready",
            Self::Degraded => "Degraded",
            Self::Failed => "Failed",
            Self::Releasing => "Releasing",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [Phase; 6] = [
        Phase::Pending,
        Phase::Allocating,
        Phase::Ready,
        Phase::Degraded,
        Phase::Failed,
        Phase::Releasing,
    ];

    #[test]
    fn test_happy_path() {
        let p = Phase::Pending;
        let p = p.transition(Phase::Allocating).unwrap();
        let p = p.transition(Phase::Ready).unwrap();
        let p = p.transition(Phase::Degraded).unwrap();
        let p = p.transition(Phase::Ready).unwrap();
        let p = p.transition(Phase::Releasing).unwrap();
        assert_eq!(p, Phase::Releasing);
    }

    #[test]
    fn test_releasing_reachable_from_every_other_phase() {
        for phase in ALL {
            if phase != Phase::Releasing {
                assert!(phase.can_transition_to(Phase::Releasing), "{phase}");
            }
        }
    }

    #[test]
    fn test_releasing_is_terminal() {
        for phase in ALL {
            assert!(!Phase::Releasing.can_transition_to(phase));
        }
    }

    #[test]
    fn test_failed_only_exits_to_releasing() {
        for phase in ALL {
            assert_eq!(
                Phase::Failed.can_transition_to(phase),
                phase == Phase::Releasing
            );
        }
    }

    #[test]
    fn test_pending_cannot_skip_to_ready() {
        let err = Phase::Pending.transition(Phase::Ready).unwrap_err();
        assert_eq!(
            err,
            FabricError::InvalidTransition {
                from: Phase::Pending,
                to: Phase::Ready,
            }
        );
    }

    #[test]
    fn test_share_holding_phases() {
        assert!(!Phase::Pending.holds_shares());
        assert!(Phase::Allocating.holds_shares());
        assert!(Phase::Degraded.holds_shares());
        assert!(!Phase::Failed.holds_shares());
        assert!(!Phase::Failed.is_live());
    }

    fn phase() -> impl Strategy<Value = Phase> {
        prop::sample::select(ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_walk_never_leaves_releasing(steps in prop::collection::vec(phase(), 0..32)) {
            let mut current = Phase::Pending;
            for next in steps {
                let before = current;
                match current.transition(next) {
                    Ok(p) => {
                        prop_assert!(before.can_transition_to(p));
                        current = p;
                    }
                    Err(_) => prop_assert_eq!(current, before),
                }
                if before == Phase::Releasing {
                    prop_assert_eq!(current, Phase::Releasing);
                }
            }
        }
    }
}
