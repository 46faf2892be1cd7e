//! Health, readiness, metrics and event endpoints

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use corridor_core::{Clock, ResourceId};
use corridor_lifecycle::{LifecycleEvent, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Daemon health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `healthy` while the daemon answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Time since startup
    pub uptime_ms: u64,
    /// Loaded config fingerprint
    pub config: String,
    /// Resources under supervision
    pub resources: usize,
}

/// Readiness query: comma-separated resource ids
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadyQuery {
    /// Resource ids
    #[serde(default)]
    pub ids: String,
}

/// Readiness of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReadiness {
    /// Resource
    pub id: ResourceId,
    /// Ready right now
    pub ready: bool,
}

/// Readiness verdict for a workload's resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// Every listed resource is Ready
    pub ready: bool,
    /// Per-resource breakdown
    pub resources: Vec<ResourceReadiness>,
}

/// Event filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    /// Only events about this resource
    #[serde(default)]
    pub resource: Option<ResourceId>,
}

/// Liveness
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = state.clock.now();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_ms: now.duration_since(state.started_at).as_millis() as u64,
        config: state.fingerprint.clone(),
        resources: state.supervisor.list().await.len(),
    })
}

/// Whether every referenced resource is Ready; an empty list is not
pub async fn ready(
    State(state): State<AppState>,
    query: Result<Query<ReadyQuery>, QueryRejection>,
) -> ApiResult<Json<ReadyResponse>> {
    let Query(query) = query?;
    let ids: Vec<ResourceId> = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ResourceId::new)
        .collect();
    if ids.is_empty() {
        return Err(ApiError::BadRequest("ids: at least one resource id required".to_string()));
    }

    let mut resources = Vec::with_capacity(ids.len());
    for id in &ids {
        resources.push(ResourceReadiness {
            id: id.clone(),
            ready: state.supervisor.is_ready(id).await,
        });
    }
    let ready = state.supervisor.all_ready(&ids).await;
    Ok(Json(ReadyResponse { ready, resources }))
}

/// Retained lifecycle events, oldest first
pub async fn events(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LifecycleEvent>>> {
    let Query(query) = query?;
    let journal = state.supervisor.journal();
    let events = match query.resource {
        Some(id) => journal.history_of(&id).await,
        None => journal.history().await,
    };
    Ok(Json(events))
}

/// Metric snapshot as JSON
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.supervisor.metrics().await)
}

/// Metric snapshot as `name value` lines
pub async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.supervisor.metrics().await;
    let mut body = String::new();
    for (name, value) in snapshot.samples() {
        let _ = writeln!(body, "{name} {value}");
    }
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["resources"], 0);
        assert_eq!(body["config"].as_str().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_ready_gates_on_every_resource() {
        let app = TestApp::new().await;
        let (_, corridor) = app
            .post("/v1/corridors", json!({"device_id": "c1", "attestation_required": false}))
            .await;
        let (_, bundle) = app
            .post(
                "/v1/ffm/alloc",
                json!({"bytes": 1024, "latency_class": "T2", "bandwidth_floor_GBs": 150}),
            )
            .await;
        let corridor = corridor["id"].as_str().unwrap().to_string();
        let bundle = bundle["id"].as_str().unwrap().to_string();

        let (status, body) = app.get(&format!("/v1/ready?ids={corridor}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);

        let (_, body) = app.get(&format!("/v1/ready?ids={corridor},{bundle}")).await;
        assert_eq!(body["ready"], false);
        assert_eq!(body["resources"][1]["ready"], false);

        let (_, body) = app.get("/v1/ready?ids=ghost").await;
        assert_eq!(body["ready"], false);

        let (status, _) = app.get("/v1/ready").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metrics_and_events() {
        let app = TestApp::new().await;
        let (_, corridor) = app
            .post("/v1/corridors", json!({"device_id": "c1", "attestation_required": false}))
            .await;
        let id = corridor["id"].as_str().unwrap().to_string();

        let (_, metrics) = app.get("/v1/metrics").await;
        assert_eq!(metrics["corridor_allocations_total"], 1);
        assert_eq!(metrics["corridor_bandwidth_gbps"], 416);

        let (status, text) = app.get("/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = text.as_str().unwrap();
        assert!(text.contains("corridoros_corridor_allocations_total 1\n"));
        assert!(text.contains("ffm_migrations_total 0\n"));

        let (_, events) = app.get(&format!("/v1/events?resource={id}")).await;
        let events = events.as_array().unwrap();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e["resource"] == id.as_str()));
        assert!(
            events
                .iter()
                .any(|e| e["event"] == "phase_changed" && e["to"] == "Ready")
        );
    }
}
