//! Calibration endpoints

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use corridor_calibrate::{AmbientProfile, CalibrationRequest, CalibrationResult, profiles as catalogue};
use corridor_core::{ResourceId, ResourceKind};

/// Calibrate a corridor.
///
/// A corridor under supervision is recalibrated in place from its own
/// measured state; any other id runs a standalone calibration of the
/// request as given.
pub async fn calibrate(
    State(state): State<AppState>,
    payload: Result<Json<CalibrationRequest>, JsonRejection>,
) -> ApiResult<Json<CalibrationResult>> {
    let Json(request) = payload?;
    let id = ResourceId::new(request.corridor_id.as_str());
    let supervised = matches!(
        state.supervisor.get(&id).await,
        Ok(resource) if resource.kind() == ResourceKind::Corridor
    );

    let result = if supervised {
        state
            .supervisor
            .recalibrate(&id, request.target_ber, Some(request.ambient_profile))
            .await?
    } else {
        state.supervisor.engine().calibrate(&request)?
    };
    if let Some(caveat) = result.caveat(&request.corridor_id) {
        tracing::warn!(corridor = %request.corridor_id, %caveat, "calibration returned a partial result");
    }
    Ok(Json(result))
}

/// Ambient profile catalogue
pub async fn profiles() -> Json<Vec<&'static AmbientProfile>> {
    Json(catalogue())
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_standalone_calibration_converges() {
        let app = TestApp::new().await;
        let (status, result) = app
            .post(
                "/v1/heliopass/calibrate",
                json!({"corridor_id": "bench-1", "target_ber": 1e-12, "current_ber": 1e-9}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["converged"], true);
        assert!(result["final_ber"].as_f64().unwrap() <= 1.1e-12);
        assert_eq!(result["bias_voltages_mv"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unknown_profile_rejected() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post(
                "/v1/heliopass/calibrate",
                json!({
                    "corridor_id": "bench-1",
                    "target_ber": 1e-12,
                    "current_ber": 1e-9,
                    "ambient_profile": "lunar_surface"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_supervised_corridor_recalibrated_in_place() {
        let app = TestApp::new().await;
        let (_, body) = app
            .post("/v1/corridors", json!({"device_id": "c1", "attestation_required": false}))
            .await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, result) = app
            .post(
                "/v1/heliopass/calibrate",
                json!({"corridor_id": id, "target_ber": 1e-13, "current_ber": 1e-3}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["converged"], true);

        let (_, corridor) = app.get(&format!("/v1/corridors/{id}")).await;
        assert_eq!(corridor["state"]["target_ber"], 1e-13);
    }

    #[tokio::test]
    async fn test_profile_catalogue() {
        let app = TestApp::new().await;
        let (status, profiles) = app.get("/v1/heliopass/profiles").await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            profiles
                .as_array()
                .unwrap()
                .iter()
                .any(|p| p["key"] == "lab_default")
        );
    }
}
