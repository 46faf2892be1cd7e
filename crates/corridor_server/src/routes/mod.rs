//! API route handlers

pub mod attest;
pub mod corridors;
pub mod fabman;
pub mod ffm;
pub mod health;
pub mod heliopass;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get, patch, post};
use corridor_core::{FabricError, ResourceId, ResourceKind};
use corridor_lifecycle::Resource;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and scheduler endpoints
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics_text))
        .route("/v1/metrics", get(health::metrics))
        .route("/v1/ready", get(health::ready))
        .route("/v1/events", get(health::events))
        // Corridors
        .route("/v1/corridors", post(corridors::create).get(corridors::list))
        .route("/v1/corridors/{id}", get(corridors::get).delete(corridors::release))
        .route("/v1/corridors/{id}/telemetry", get(corridors::telemetry))
        .route("/v1/corridors/{id}/recalibrate", post(corridors::recalibrate))
        .route("/v1/corridors/{id}/bandwidth", patch(corridors::adjust_bandwidth))
        .route("/v1/corridors/{id}/reattest", post(corridors::reattest))
        .route("/v1/corridors/{id}/observe", post(corridors::observe))
        // Memory bundles
        .route("/v1/ffm", get(ffm::list))
        .route("/v1/ffm/alloc", post(ffm::allocate))
        .route("/v1/ffm/{id}", get(ffm::get).delete(ffm::release))
        .route("/v1/ffm/{id}/telemetry", get(ffm::telemetry))
        .route("/v1/ffm/{id}/bandwidth", patch(ffm::adjust_bandwidth))
        .route("/v1/ffm/{id}/latency_class", patch(ffm::adjust_latency_class))
        .route("/v1/ffm/{id}/reattest", post(ffm::reattest))
        .route("/v1/ffm/{id}/observe", post(ffm::observe))
        // Attestation
        .route("/v1/attest/device", post(attest::attest_device))
        .route("/v1/attest/baselines", post(attest::register_baseline))
        .route("/v1/attest/audit", get(attest::audit))
        .route("/v1/attest/{ticket_id}", get(attest::verify))
        // Fabric manager
        .route("/v1/fabman/devices", get(fabman::list_devices).post(fabman::register_device))
        .route("/v1/fabman/devices/{id}", get(fabman::get_device))
        .route("/v1/fabman/devices/{id}/state", post(fabman::set_device_state))
        .route("/v1/fabman/devices/{id}/wavelengths/{nm}/lost", post(fabman::lose_wavelength))
        .route("/v1/fabman/paths", get(fabman::list_paths).post(fabman::create_path))
        .route("/v1/fabman/paths/{id}", get(fabman::get_path))
        .route("/v1/fabman/policies", get(fabman::list_policies).post(fabman::add_policy))
        .route("/v1/fabman/policies/{name}", delete(fabman::delete_policy))
        .route("/v1/fabman/pools", get(fabman::pools))
        // Calibration
        .route("/v1/heliopass/calibrate", post(heliopass::calibrate))
        .route("/v1/heliopass/profiles", get(heliopass::profiles))
        .with_state(state)
}

/// Look up a resource and insist on its kind, so a bundle id is not served
/// under the corridor routes
async fn resource_of_kind(state: &AppState, id: &ResourceId, kind: ResourceKind) -> ApiResult<Resource> {
    let resource = state.supervisor.get(id).await?;
    if resource.kind() != kind {
        return Err(ApiError::from(FabricError::not_found(&kind.to_string(), id)));
    }
    Ok(resource)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use corridor_attest::baseline::digest;
    use corridor_attest::{AttestationRequest, Baseline};
    use corridor_calibrate::{CalibrationConfig, NoiseModel};
    use corridor_core::{DeviceId, LatencyClass, ManualClock, SharedClock, TicketId, Timestamp};
    use corridor_inventory::Device;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub const FIRMWARE: &[u8] = b"corridor-fw-2.4.1";
    pub const CONFIG: &[u8] = b"lanes=8;grid=50GHz";

    /// Router over a small fabric with a frozen clock
    pub struct TestApp {
        pub state: AppState,
        pub clock: Arc<ManualClock>,
    }

    impl TestApp {
        pub async fn new() -> Self {
            let clock = ManualClock::shared(Timestamp::from_millis(1_000_000));
            let shared: SharedClock = clock.clone();
            let mut config = crate::config::FabricConfig::new()
                .with_device(Device::corridor("c1", 8, 500))
                .with_device(Device::memory("m0", 1 << 40, 200, LatencyClass::T0))
                .with_device(Device::memory("m2", 1 << 40, 100, LatencyClass::T2));
            config.calibration = CalibrationConfig::default().with_noise(NoiseModel::Disabled);
            let state = AppState::build(config, shared).await.unwrap();
            Self { state, clock }
        }

        pub async fn ticket(&self, device: &str) -> TicketId {
            let verifier = self.state.supervisor.verifier();
            verifier
                .register_baseline(DeviceId::new(device), Baseline::from_images(FIRMWARE, CONFIG))
                .await;
            verifier
                .attest(AttestationRequest::new(device, digest(FIRMWARE), digest(CONFIG)))
                .await
                .id
        }

        pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let request = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(json) => request
                    .header("content-type", "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => request.body(Body::empty()).unwrap(),
            };
            let response = create_router(self.state.clone()).oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            };
            (status, value)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, None).await
        }

        pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, uri, Some(body)).await
        }
    }
}
