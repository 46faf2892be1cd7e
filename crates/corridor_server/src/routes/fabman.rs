//! Fabric manager endpoints: devices, paths, policies and pools

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use corridor_alloc::{LaneLoss, PoolUsage};
use corridor_core::{DeviceId, PathId};
use corridor_inventory::{Device, FabricPath, PathRequest, Policy, PolicyRequest};
use corridor_lifecycle::DeviceReport;
use serde::{Deserialize, Serialize};

/// Device status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRequest {
    /// `active`, `disabled` or `maintenance`
    pub state: String,
}

/// All devices
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<Device>> {
    Json(state.supervisor.inventory().list_devices().await)
}

/// Register or refresh a device and its pools
pub async fn register_device(
    State(state): State<AppState>,
    payload: Result<Json<Device>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    let Json(device) = payload?;
    let device = state.supervisor.provision_device(device).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// One device
pub async fn get_device(State(state): State<AppState>, Path(id): Path<DeviceId>) -> ApiResult<Json<Device>> {
    Ok(Json(state.supervisor.inventory().get_device(&id).await?))
}

/// Change a device's status; dropping it fails or moves its dependents
pub async fn set_device_state(
    State(state): State<AppState>,
    Path(id): Path<DeviceId>,
    payload: Result<Json<StateRequest>, JsonRejection>,
) -> ApiResult<Json<DeviceReport>> {
    let Json(request) = payload?;
    Ok(Json(state.supervisor.set_device_state(&id, &request.state).await?))
}

/// Report a lost wavelength on a corridor device
pub async fn lose_wavelength(
    State(state): State<AppState>,
    Path((id, nm)): Path<(DeviceId, u32)>,
) -> ApiResult<Json<LaneLoss>> {
    Ok(Json(state.supervisor.report_wavelength_loss(&id, nm).await?))
}

/// Create a path between two devices
pub async fn create_path(
    State(state): State<AppState>,
    payload: Result<Json<PathRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<FabricPath>)> {
    let Json(request) = payload?;
    let path = state.supervisor.inventory().create_path(request).await?;
    Ok((StatusCode::CREATED, Json(path)))
}

/// All paths
pub async fn list_paths(State(state): State<AppState>) -> Json<Vec<FabricPath>> {
    Json(state.supervisor.inventory().list_paths().await)
}

/// One path
pub async fn get_path(State(state): State<AppState>, Path(id): Path<PathId>) -> ApiResult<Json<FabricPath>> {
    Ok(Json(state.supervisor.inventory().get_path(&id).await?))
}

/// Insert or replace a policy
pub async fn add_policy(
    State(state): State<AppState>,
    payload: Result<Json<PolicyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Policy>)> {
    let Json(request) = payload?;
    let policy = state.supervisor.inventory().add_policy(request).await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

/// All policies
pub async fn list_policies(State(state): State<AppState>) -> Json<Vec<Policy>> {
    Json(state.supervisor.inventory().list_policies().await)
}

/// Delete a policy
pub async fn delete_policy(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    state.supervisor.inventory().delete_policy(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pool capacity and usage
pub async fn pools(State(state): State<AppState>) -> Json<Vec<PoolUsage>> {
    Json(state.supervisor.allocator().usage().await)
}
