//! Corridor fabric attestation
//!
//! Validates firmware and configuration claims against per-device baselines
//! and issues time-boxed tickets that gate admission. Tickets may be signed
//! with Ed25519; every issuance and verification lands in an append-only
//! audit trail that can be replayed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod baseline;
pub mod config;
pub mod signature;
pub mod ticket;
pub mod verifier;

pub use audit::{AuditEvent, AuditRecord, AuditReplay};
pub use baseline::Baseline;
pub use config::AttestConfig;
pub use signature::{SignatureError, TicketSignature, TicketSigner};
pub use ticket::{AttestationRequest, AttestationTicket, TicketVerdict};
pub use verifier::AttestationVerifier;
