//! Attestation requests, tickets and verdicts.

use crate::signature::TicketSignature;
use corridor_core::{DeviceId, TicketId, Timestamp, TrustLevel};
use serde::{Deserialize, Serialize};

/// Claims presented by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    /// Device making the claim
    pub device_id: DeviceId,
    /// Claimed firmware digest
    pub firmware_hash: String,
    /// Claimed configuration digest
    pub config_hash: String,
    /// Whether the ticket must carry a signature
    #[serde(default, alias = "require_pqc")]
    pub require_signature: bool,
}

impl AttestationRequest {
    /// Create a request without a signature requirement
    #[must_use]
    pub fn new(
        device_id: impl Into<DeviceId>,
        firmware_hash: impl Into<String>,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            firmware_hash: firmware_hash.into(),
            config_hash: config_hash.into(),
            require_signature: false,
        }
    }

    /// Require a signed ticket
    #[must_use]
    pub fn with_signature(mut self) -> Self {
        self.require_signature = true;
        self
    }
}

/// Time-boxed assertion that a device met its baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationTicket {
    /// Ticket identifier
    pub id: TicketId,
    /// Subject device
    pub device_id: DeviceId,
    /// Both claims validated
    pub valid: bool,
    /// Derived trust level
    pub trust_level: TrustLevel,
    /// Firmware claim validated
    pub firmware_valid: bool,
    /// Config claim validated
    pub config_valid: bool,
    /// Issue time
    pub issued_at: Timestamp,
    /// Expiry (exclusive)
    pub expires_at: Timestamp,
    /// Signature over the canonical body, when one was required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<TicketSignature>,
}

#[derive(Serialize)]
struct CanonicalBody<'a> {
    id: &'a TicketId,
    device_id: &'a DeviceId,
    valid: bool,
    trust_level: TrustLevel,
    issued_at: Timestamp,
    expires_at: Timestamp,
}

impl AttestationTicket {
    /// Bytes covered by the signature
    #[must_use]
    pub fn canonical_body(&self) -> Vec<u8> {
        let body = CanonicalBody {
            id: &self.id,
            device_id: &self.device_id,
            valid: self.valid,
            trust_level: self.trust_level,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        };
        // Plain struct of strings, bools and integers; serialization cannot fail.
        serde_json::to_vec(&body).unwrap_or_default()
    }

    /// Whether `now` falls in `[issued_at, expires_at)`
    #[must_use]
    pub fn within_window(&self, now: Timestamp) -> bool {
        self.issued_at <= now && now < self.expires_at
    }
}

/// Result of a ticket check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketVerdict {
    /// Ticket checked
    pub ticket_id: TicketId,
    /// Subject device
    pub device_id: DeviceId,
    /// Usable right now
    pub valid: bool,
    /// Trust level recorded at issuance
    pub trust_level: TrustLevel,
    /// Expiry
    pub expires_at: Timestamp,
    /// Why the ticket is unusable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> AttestationTicket {
        AttestationTicket {
            id: TicketId::sequential(1),
            device_id: DeviceId::new("corridor-001"),
            valid: true,
            trust_level: TrustLevel::Medium,
            firmware_valid: true,
            config_valid: true,
            issued_at: Timestamp::from_millis(1_000),
            expires_at: Timestamp::from_millis(2_000),
            signature: None,
        }
    }

    #[test]
    fn test_window_is_half_open() {
        let t = ticket();
        assert!(!t.within_window(Timestamp::from_millis(999)));
        assert!(t.within_window(Timestamp::from_millis(1_000)));
        assert!(t.within_window(Timestamp::from_millis(1_999)));
        assert!(!t.within_window(Timestamp::from_millis(2_000)));
    }

    #[test]
    fn test_canonical_body_ignores_signature() {
        let a = ticket();
        let mut b = ticket();
        b.signature = Some(TicketSignature {
            key: "k".to_string(),
            bytes: "s".to_string(),
        });
        assert_eq!(a.canonical_body(), b.canonical_body());

        b.trust_level = TrustLevel::High;
        assert_ne!(a.canonical_body(), b.canonical_body());
    }

    #[test]
    fn test_request_accepts_legacy_field_name() {
        let req: AttestationRequest = serde_json::from_str(
            r#"{"device_id":"cxl-dev-001","firmware_hash":"a","config_hash":"b","require_pqc":true}"#,
        )
        .unwrap();
        assert!(req.require_signature);
    }
}
