//! Append-only audit trail of attestation decisions.
//!
//! Replaying the trail re-derives every issuance decision from the recorded
//! claim outcomes and checks that every verification refers to a ticket that
//! was issued earlier in the trail.

use corridor_core::{DeviceId, FabricError, FabricResult, TicketId, Timestamp, TrustLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Audited decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A ticket was issued
    Issued {
        /// Ticket id
        ticket: TicketId,
        /// Subject device
        device: DeviceId,
        /// Firmware claim validated
        firmware_valid: bool,
        /// Config claim validated
        config_valid: bool,
        /// Signature produced
        signed: bool,
        /// Trust level recorded on the ticket
        trust_level: TrustLevel,
    },
    /// A ticket was checked
    Verified {
        /// Ticket id
        ticket: TicketId,
        /// Whether it was usable
        usable: bool,
        /// Rejection reason
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// One entry in the trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the trail, starting at 0
    pub seq: u64,
    /// When the decision was made
    pub at: Timestamp,
    /// The decision
    pub event: AuditEvent,
}

/// Summary of a successful replay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReplay {
    /// Tickets issued
    pub issued: u64,
    /// Verifications that accepted the ticket
    pub accepted: u64,
    /// Verifications that rejected the ticket
    pub rejected: u64,
    /// Issued tickets per trust level
    pub by_trust: HashMap<TrustLevel, u64>,
}

/// Replay a trail and check it for consistency
///
/// # Errors
///
/// Returns `Internal` if sequence numbers are out of order, a recorded trust
/// level disagrees with the claims it was derived from, a ticket id is issued
/// twice, or a verification references a ticket not issued before it.
pub fn replay(records: &[AuditRecord]) -> FabricResult<AuditReplay> {
    let mut summary = AuditReplay::default();
    let mut issued: HashMap<&TicketId, TrustLevel> = HashMap::new();

    for (expected_seq, record) in records.iter().enumerate() {
        if record.seq != expected_seq as u64 {
            return Err(corrupt(format!(
                "record {expected_seq} carries sequence number {}",
                record.seq
            )));
        }

        match &record.event {
            AuditEvent::Issued {
                ticket,
                firmware_valid,
                config_valid,
                signed,
                trust_level,
                ..
            } => {
                let derived = TrustLevel::derive(*firmware_valid, *config_valid, *signed);
                if derived != *trust_level {
                    return Err(corrupt(format!(
                        "{ticket} recorded as {trust_level}, claims derive {derived}"
                    )));
                }
                if issued.insert(ticket, derived).is_some() {
                    return Err(corrupt(format!("{ticket} issued twice")));
                }
                summary.issued += 1;
                *summary.by_trust.entry(derived).or_default() += 1;
            }
            AuditEvent::Verified { ticket, usable, .. } => {
                if !issued.contains_key(ticket) {
                    return Err(corrupt(format!("{ticket} verified before issuance")));
                }
                if *usable {
                    summary.accepted += 1;
                } else {
                    summary.rejected += 1;
                }
            }
        }
    }

    Ok(summary)
}

fn corrupt(message: String) -> FabricError {
    FabricError::Internal {
        message: format!("audit trail inconsistent: {message}"),
    }
}
