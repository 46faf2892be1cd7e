//! Memory bundle endpoints

use super::corridors::ReattestRequest;
use super::resource_of_kind;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use corridor_core::{LatencyClass, ResourceId, ResourceKind};
use corridor_lifecycle::{BundleSpec, Observation, Resource, ResourceSpec, Telemetry};
use serde::{Deserialize, Serialize};

/// New bundle bandwidth floor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FloorRequest {
    /// Floor in GB/s
    #[serde(rename = "floor_GBs")]
    pub floor_gbs: u64,
}

/// Latency class change
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyClassRequest {
    /// Tier to move to
    pub target: LatencyClass,
}

/// Accepted migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationAccepted {
    /// Bundle being moved
    pub id: ResourceId,
    /// Tier it is moving to
    pub target: LatencyClass,
    /// Always `migrating`
    pub status: String,
}

/// Allocate a memory bundle
pub async fn allocate(
    State(state): State<AppState>,
    payload: Result<Json<BundleSpec>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let Json(spec) = payload?;
    let resource = state.supervisor.allocate(ResourceSpec::MemoryBundle(spec)).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// List memory bundles
pub async fn list(State(state): State<AppState>) -> Json<Vec<Resource>> {
    let bundles = state
        .supervisor
        .list()
        .await
        .into_iter()
        .filter(|r| r.kind() == ResourceKind::MemoryBundle)
        .collect();
    Json(bundles)
}

/// Get one bundle
pub async fn get(State(state): State<AppState>, Path(id): Path<ResourceId>) -> ApiResult<Json<Resource>> {
    Ok(Json(resource_of_kind(&state, &id, ResourceKind::MemoryBundle).await?))
}

/// Release a bundle; unknown ids are a no-op
pub async fn release(State(state): State<AppState>, Path(id): Path<ResourceId>) -> ApiResult<Response> {
    match state.supervisor.release(&id).await? {
        Some(resource) => Ok(Json(resource).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Bundle telemetry
pub async fn telemetry(State(state): State<AppState>, Path(id): Path<ResourceId>) -> ApiResult<Json<Telemetry>> {
    resource_of_kind(&state, &id, ResourceKind::MemoryBundle).await?;
    Ok(Json(state.supervisor.get_telemetry(&id).await?))
}

/// Change the bandwidth floor
pub async fn adjust_bandwidth(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<FloorRequest>, JsonRejection>,
) -> ApiResult<Json<Resource>> {
    let Json(request) = payload?;
    resource_of_kind(&state, &id, ResourceKind::MemoryBundle).await?;
    Ok(Json(state.supervisor.adjust_bandwidth_floor(&id, request.floor_gbs).await?))
}

/// Start a latency class migration; completion shows up on the bundle and
/// in the event stream
pub async fn adjust_latency_class(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<LatencyClassRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MigrationAccepted>)> {
    let Json(request) = payload?;
    // Dropping the handle detaches the task
    let task = state.supervisor.adjust_latency_class(&id, request.target).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MigrationAccepted {
            id: task.resource.clone(),
            target: task.target,
            status: "migrating".to_string(),
        }),
    ))
}

/// Put a fresh ticket in force
pub async fn reattest(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<ReattestRequest>, JsonRejection>,
) -> ApiResult<Json<Resource>> {
    let Json(request) = payload?;
    resource_of_kind(&state, &id, ResourceKind::MemoryBundle).await?;
    Ok(Json(state.supervisor.reattest(&id, &request.ticket).await?))
}

/// Feed a telemetry sample into the failure policy
pub async fn observe(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    payload: Result<Json<Observation>, JsonRejection>,
) -> ApiResult<Json<Resource>> {
    let Json(sample) = payload?;
    resource_of_kind(&state, &id, ResourceKind::MemoryBundle).await?;
    Ok(Json(state.supervisor.observe(&id, sample).await?))
}
