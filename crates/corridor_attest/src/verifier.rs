//! Attestation verifier.
//!
//! Validates device claims against registered baselines, issues time-boxed
//! tickets and answers ticket checks. Expired or invalid tickets fail closed.

use crate::audit::{self, AuditEvent, AuditRecord, AuditReplay};
use crate::baseline::Baseline;
use crate::config::AttestConfig;
use crate::signature::TicketSigner;
use crate::ticket::{AttestationRequest, AttestationTicket, TicketVerdict};
use corridor_core::{
    DeviceId, FabricError, FabricResult, SharedClock, TicketId, Timestamp, TrustLevel,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Attestation verifier
pub struct AttestationVerifier {
    config: AttestConfig,
    clock: SharedClock,
    signer: TicketSigner,
    baselines: Arc<RwLock<HashMap<DeviceId, Baseline>>>,
    tickets: Arc<RwLock<HashMap<TicketId, AttestationTicket>>>,
    audit: Arc<RwLock<Vec<AuditRecord>>>,
    next_ticket: AtomicU64,
}

impl AttestationVerifier {
    /// Create a verifier
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configured signing key is malformed
    pub fn new(config: AttestConfig, clock: SharedClock) -> FabricResult<Self> {
        let signer = match &config.signing_key_hex {
            Some(secret) => TicketSigner::from_secret_hex(secret)?,
            None => TicketSigner::generate(),
        };
        Ok(Self {
            config,
            clock,
            signer,
            baselines: Arc::new(RwLock::new(HashMap::new())),
            tickets: Arc::new(RwLock::new(HashMap::new())),
            audit: Arc::new(RwLock::new(Vec::new())),
            next_ticket: AtomicU64::new(1),
        })
    }

    /// Verifier configuration
    #[must_use]
    pub fn config(&self) -> &AttestConfig {
        &self.config
    }

    /// Public key tickets are signed with
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        self.signer.public_key_hex()
    }

    /// Register (or replace) a device's known-good baseline
    pub async fn register_baseline(&self, device: DeviceId, baseline: Baseline) {
        info!(device = %device, "registered attestation baseline");
        self.baselines.write().await.insert(device, baseline);
    }

    /// Baseline registered for a device
    pub async fn baseline(&self, device: &DeviceId) -> Option<Baseline> {
        self.baselines.read().await.get(device).cloned()
    }

    /// Validate claims and issue a ticket.
    ///
    /// A device without a registered baseline validates neither claim and
    /// receives an `untrusted` ticket. Issuance never fails on bad claims;
    /// the ticket simply records `valid = false`.
    pub async fn attest(&self, request: AttestationRequest) -> AttestationTicket {
        let (firmware_valid, config_valid) = {
            let baselines = self.baselines.read().await;
            match baselines.get(&request.device_id) {
                Some(b) => (
                    b.firmware_matches(&request.firmware_hash),
                    b.config_matches(&request.config_hash),
                ),
                None => (false, false),
            }
        };

        let signed = request.require_signature;
        let trust_level = TrustLevel::derive(firmware_valid, config_valid, signed);
        let now = self.clock.now();
        let id = TicketId::sequential(self.next_ticket.fetch_add(1, Ordering::SeqCst));

        let mut ticket = AttestationTicket {
            id: id.clone(),
            device_id: request.device_id.clone(),
            valid: firmware_valid && config_valid,
            trust_level,
            firmware_valid,
            config_valid,
            issued_at: now,
            expires_at: now.saturating_add(Duration::from_millis(self.config.ticket_ttl_ms)),
            signature: None,
        };
        if signed {
            ticket.signature = Some(self.signer.sign(&ticket.canonical_body()));
        }

        if ticket.valid {
            info!(ticket = %id, device = %ticket.device_id, trust = %trust_level, "attestation ticket issued");
        } else {
            warn!(
                ticket = %id,
                device = %ticket.device_id,
                firmware_valid,
                config_valid,
                trust = %trust_level,
                "attestation claims did not validate"
            );
        }

        self.tickets.write().await.insert(id.clone(), ticket.clone());
        self.record(
            now,
            AuditEvent::Issued {
                ticket: id,
                device: request.device_id,
                firmware_valid,
                config_valid,
                signed,
                trust_level,
            },
        )
        .await;

        ticket
    }

    /// Fetch an issued ticket
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ticket id
    pub async fn ticket(&self, id: &TicketId) -> FabricResult<AttestationTicket> {
        self.tickets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| FabricError::not_found("ticket", id))
    }

    /// Check a ticket at the current time
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ticket id. An unusable ticket is a
    /// successful verdict with `valid = false` and a reason.
    pub async fn verify_ticket(&self, id: &TicketId) -> FabricResult<TicketVerdict> {
        let ticket = self.ticket(id).await?;
        let now = self.clock.now();
        let rejection = self.rejection_reason(&ticket, now);

        self.record(
            now,
            AuditEvent::Verified {
                ticket: id.clone(),
                usable: rejection.is_none(),
                reason: rejection.clone(),
            },
        )
        .await;

        Ok(TicketVerdict {
            ticket_id: ticket.id,
            device_id: ticket.device_id,
            valid: rejection.is_none(),
            trust_level: ticket.trust_level,
            expires_at: ticket.expires_at,
            reason: rejection,
        })
    }

    /// Require a ticket to be usable right now.
    ///
    /// Used by admission. Unknown, invalid, expired or tampered tickets are
    /// all `AttestationInvalid`.
    ///
    /// # Errors
    ///
    /// Returns `AttestationInvalid` with the rejection reason
    pub async fn require_usable(&self, id: &TicketId) -> FabricResult<AttestationTicket> {
        let Ok(ticket) = self.ticket(id).await else {
            warn!(ticket = %id, "unknown attestation ticket presented");
            return Err(FabricError::attestation_invalid(id, "unknown ticket"));
        };

        match self.verify_ticket(id).await?.reason {
            None => {
                debug!(ticket = %id, device = %ticket.device_id, "attestation ticket accepted");
                Ok(ticket)
            }
            Some(reason) => {
                warn!(ticket = %id, device = %ticket.device_id, %reason, "attestation ticket rejected");
                Err(FabricError::attestation_invalid(id, reason))
            }
        }
    }

    fn rejection_reason(&self, ticket: &AttestationTicket, now: Timestamp) -> Option<String> {
        if !ticket.valid {
            return Some(format!("claims did not validate (trust level {})", ticket.trust_level));
        }
        if !ticket.within_window(now) {
            return Some(if now < ticket.issued_at {
                format!("not valid before {}", ticket.issued_at)
            } else {
                format!("expired at {}", ticket.expires_at)
            });
        }
        if let Some(signature) = &ticket.signature {
            if let Err(err) = self.signer.verify(&ticket.canonical_body(), signature) {
                return Some(err.to_string());
            }
        }
        None
    }

    /// Number of tickets issued so far
    pub async fn issued_count(&self) -> u64 {
        self.tickets.read().await.len() as u64
    }

    /// Copy of the audit trail
    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit.read().await.clone()
    }

    /// Replay the audit trail
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the trail is inconsistent
    pub async fn replay_audit(&self) -> FabricResult<AuditReplay> {
        let records = self.audit.read().await;
        audit::replay(&records)
    }

    async fn record(&self, at: Timestamp, event: AuditEvent) {
        let mut log = self.audit.write().await;
        let seq = log.len() as u64;
        log.push(AuditRecord { seq, at, event });
    }

    #[cfg(test)]
    async fn tamper(&self, id: &TicketId, f: impl FnOnce(&mut AttestationTicket)) {
        if let Some(ticket) = self.tickets.write().await.get_mut(id) {
            f(ticket);
        }
    }
}

impl std::fmt::Debug for AttestationVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationVerifier")
            .field("config", &self.config)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::digest;
    use corridor_core::{ErrorCode, ManualClock};

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    async fn setup() -> (AttestationVerifier, Arc<ManualClock>) {
        let clock = ManualClock::shared(Timestamp::from_millis(1_000_000));
        let verifier = AttestationVerifier::new(AttestConfig::default(), clock.clone()).unwrap();
        verifier
            .register_baseline(
                DeviceId::new("cxl-dev-001"),
                Baseline::from_images(b"fw-2.1.0", b"cfg-default"),
            )
            .await;
        (verifier, clock)
    }

    fn good_claims() -> AttestationRequest {
        AttestationRequest::new("cxl-dev-001", digest(b"fw-2.1.0"), digest(b"cfg-default"))
    }

    #[tokio::test]
    async fn test_trust_levels() {
        let (verifier, _) = setup().await;

        let t = verifier.attest(good_claims().with_signature()).await;
        assert_eq!(t.trust_level, TrustLevel::High);
        assert!(t.valid);
        assert!(t.signature.is_some());

        let t = verifier.attest(good_claims()).await;
        assert_eq!(t.trust_level, TrustLevel::Medium);
        assert!(t.signature.is_none());

        let mut claims = good_claims();
        claims.config_hash = digest(b"cfg-tampered");
        let t = verifier.attest(claims).await;
        assert_eq!(t.trust_level, TrustLevel::Low);
        assert!(!t.valid);

        let mut claims = good_claims();
        claims.firmware_hash = "0".repeat(64);
        claims.config_hash = "short".to_string();
        let t = verifier.attest(claims).await;
        assert_eq!(t.trust_level, TrustLevel::Untrusted);
    }

    #[tokio::test]
    async fn test_unknown_device_is_untrusted() {
        let (verifier, _) = setup().await;
        let claims = AttestationRequest::new("cxl-dev-999", digest(b"fw-2.1.0"), digest(b"cfg-default"));
        let t = verifier.attest(claims).await;
        assert_eq!(t.trust_level, TrustLevel::Untrusted);
        assert!(!t.valid);
    }

    #[tokio::test]
    async fn test_sequential_ids_and_expiry() {
        let (verifier, _) = setup().await;
        let a = verifier.attest(good_claims()).await;
        let b = verifier.attest(good_claims()).await;
        assert_eq!(a.id.as_str(), "attest-1");
        assert_eq!(b.id.as_str(), "attest-2");
        assert_eq!(a.expires_at.as_millis() - a.issued_at.as_millis(), DAY_MS);
    }

    #[tokio::test]
    async fn test_ticket_usable_only_within_window() {
        let (verifier, clock) = setup().await;
        let ticket = verifier.attest(good_claims()).await;

        assert!(verifier.require_usable(&ticket.id).await.is_ok());

        clock.advance(Duration::from_millis(DAY_MS - 1));
        assert!(verifier.verify_ticket(&ticket.id).await.unwrap().valid);

        clock.advance(Duration::from_millis(1));
        let verdict = verifier.verify_ticket(&ticket.id).await.unwrap();
        assert!(!verdict.valid);
        assert!(verdict.reason.unwrap().contains("expired"));

        let err = verifier.require_usable(&ticket.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AttestationInvalid);
    }

    #[tokio::test]
    async fn test_ticket_not_usable_before_issue() {
        let (verifier, clock) = setup().await;
        let ticket = verifier.attest(good_claims()).await;

        let before = Timestamp::from_millis(999_999);
        clock.set(before);
        assert!(!ticket.within_window(before));
        let verdict = verifier.verify_ticket(&ticket.id).await.unwrap();
        assert!(!verdict.valid);
        assert!(verdict.reason.unwrap().starts_with("not valid before"));

        clock.set(ticket.issued_at);
        assert!(verifier.verify_ticket(&ticket.id).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_invalid_ticket_fails_closed() {
        let (verifier, _) = setup().await;
        let mut claims = good_claims();
        claims.firmware_hash = digest(b"fw-unknown");
        let ticket = verifier.attest(claims).await;

        let err = verifier.require_usable(&ticket.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AttestationInvalid);
    }

    #[tokio::test]
    async fn test_unknown_ticket() {
        let (verifier, _) = setup().await;
        let missing = TicketId::new("attest-404");
        assert_eq!(
            verifier.verify_ticket(&missing).await.unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            verifier.require_usable(&missing).await.unwrap_err().code(),
            ErrorCode::AttestationInvalid
        );
    }

    #[tokio::test]
    async fn test_tampered_signed_ticket_rejected() {
        let (verifier, _) = setup().await;
        let ticket = verifier.attest(good_claims().with_signature()).await;
        verifier
            .tamper(&ticket.id, |t| t.expires_at = t.expires_at.saturating_add(Duration::from_secs(3600)))
            .await;

        let verdict = verifier.verify_ticket(&ticket.id).await.unwrap();
        assert!(!verdict.valid);
        assert!(verdict.reason.unwrap().contains("signature"));
    }

    #[tokio::test]
    async fn test_audit_replay() {
        let (verifier, clock) = setup().await;
        let good = verifier.attest(good_claims()).await;
        let mut claims = good_claims();
        claims.config_hash = digest(b"other");
        let low = verifier.attest(claims).await;

        verifier.verify_ticket(&good.id).await.unwrap();
        verifier.verify_ticket(&low.id).await.unwrap();
        clock.advance(Duration::from_millis(DAY_MS));
        verifier.verify_ticket(&good.id).await.unwrap();

        let log = verifier.audit_log().await;
        assert_eq!(log.len(), 5);

        let summary = verifier.replay_audit().await.unwrap();
        assert_eq!(summary.issued, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 2);
        assert_eq!(verifier.issued_count().await, 2);
    }

    #[tokio::test]
    async fn test_fixed_signing_key() {
        let clock = ManualClock::shared(Timestamp::EPOCH);
        let config = AttestConfig::default().with_signing_key("22".repeat(32));
        let a = AttestationVerifier::new(config.clone(), clock.clone()).unwrap();
        let b = AttestationVerifier::new(config, clock).unwrap();
        assert_eq!(a.public_key_hex(), b.public_key_hex());

        let bad = AttestConfig::default().with_signing_key("nothex");
        let err = AttestationVerifier::new(bad, ManualClock::shared(Timestamp::EPOCH)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}
