//! Corridor endpoints

use super::resource_of_kind;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use corridor_calibrate::CalibrationResult;
use corridor_core::{ResourceId, ResourceKind, TicketId};
use corridor_lifecycle::{CorridorSpec, Observation, Resource, ResourceSpec, Telemetry};
use serde::{Deserialize, Serialize};

/// Recalibration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecalibrateRequest {
    /// Target BER; the configured default when absent
    #[serde(default)]
    pub target_ber: Option<f64>,
    /// Ambient profile; the configured default when absent
    #[serde(default)]
    pub ambient_profile: Option<String>,
}

/// New corridor bandwidth floor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FloorRequest {
    /// Floor in Gbps
    pub min_gbps: u64,
}

/// Replacement attestation ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReattestRequest {
    /// Ticket to put in force
    pub ticket: TicketId,
}

/// Allocate a corridor
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CorridorSpec>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let Json(spec) = payload?;
    let resource = state.supervisor.allocate(ResourceSpec::Corridor(spec)).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// List corridors
pub async fn list(State(state): State<AppState>) -> Json<Vec<Resource>> {
    let corridors = state
        .supervisor
        .list()
        .await
        .into_iter()
        .filter(|r| r.kind() == ResourceKind::Corridor)
        .collect();
    Json(corridors)
}

/// Get one corridor
pub async fn get(State(state): State<AppState>, Path(id): Path<ResourceId>) -> ApiResult<Json<Resource>> {
    Ok(Json(resource_of_kind(&state, &id, ResourceKind::Corridor).await?))
}

/// Release a corridor; unknown ids are a no-op
pub async fn release(State(state): State<AppState>, Path(id): Path<ResourceId>) -> ApiResult<Response> {
    match state.supervisor.release(&id).await? {
        Some(resource) => Ok(Json(resource).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Corridor telemetry
pub async fn telemetry(State(state): State<AppState>, Path(id): Path<ResourceId>) -> ApiResult<Json<Telemetry>> {
    resource_of_kind(&state, &id, ResourceKind::Corridor).await?;
    Ok(Json(state.supervisor.get_telemetry(&id).await?))
}

/// Recalibrate a live corridor
pub async fn recalibrate(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<RecalibrateRequest>, JsonRejection>,
) -> ApiResult<Json<CalibrationResult>> {
    let Json(request) = payload?;
    let target = request.target_ber.unwrap_or(state.supervisor.config().target_ber);
    let result = state.supervisor.recalibrate(&id, target, request.ambient_profile).await?;
    Ok(Json(result))
}

/// Change the bandwidth floor
pub async fn adjust_bandwidth(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<FloorRequest>, JsonRejection>,
) -> ApiResult<Json<Resource>> {
    let Json(request) = payload?;
    resource_of_kind(&state, &id, ResourceKind::Corridor).await?;
    Ok(Json(state.supervisor.adjust_bandwidth_floor(&id, request.min_gbps).await?))
}

/// Put a fresh ticket in force
pub async fn reattest(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<ReattestRequest>, JsonRejection>,
) -> ApiResult<Json<Resource>> {
    let Json(request) = payload?;
    resource_of_kind(&state, &id, ResourceKind::Corridor).await?;
    Ok(Json(state.supervisor.reattest(&id, &request.ticket).await?))
}

/// Feed a telemetry sample into the failure policy
pub async fn observe(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<Observation>, JsonRejection>,
) -> ApiResult<Json<Resource>> {
    let Json(sample) = payload?;
    resource_of_kind(&state, &id, ResourceKind::Corridor).await?;
    Ok(Json(state.supervisor.observe(&id, sample).await?))
}
