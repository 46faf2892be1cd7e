//! Attestation endpoints

use crate::config::BaselineSeed;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use corridor_attest::{AttestationRequest, AttestationTicket, AuditRecord, AuditReplay, Baseline, TicketVerdict};
use corridor_core::TicketId;
use serde::{Deserialize, Serialize};

/// Audit trail with its replay summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResponse {
    /// Replay summary
    pub replay: AuditReplay,
    /// Every record, oldest first
    pub records: Vec<AuditRecord>,
}

/// Validate device claims and issue a ticket
pub async fn attest_device(
    State(state): State<AppState>,
    payload: Result<Json<AttestationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AttestationTicket>)> {
    let Json(request) = payload?;
    let ticket = state.supervisor.verifier().attest(request).await;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Register known-good measurements for a device
pub async fn register_baseline(
    State(state): State<AppState>,
    payload: Result<Json<BaselineSeed>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(seed) = payload?;
    let baseline = Baseline::new(seed.firmware_hash, seed.config_hash)?;
    state.supervisor.verifier().register_baseline(seed.device_id, baseline).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Verify a ticket at the current time
pub async fn verify(State(state): State<AppState>, Path(ticket_id): Path<TicketId>) -> ApiResult<Json<TicketVerdict>> {
    Ok(Json(state.supervisor.verifier().verify_ticket(&ticket_id).await?))
}

/// Audit trail and replay
pub async fn audit(State(state): State<AppState>) -> ApiResult<Json<AuditResponse>> {
    let verifier = state.supervisor.verifier();
    let replay = verifier.replay_audit().await?;
    let records = verifier.audit_log().await;
    Ok(Json(AuditResponse { replay, records }))
}
