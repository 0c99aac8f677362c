use crate::api::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Ready once the store answers a query.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.repo.count_tracked_addresses().await {
        Ok(tracked) => (
            StatusCode::OK,
            Json(json!({"status": "ready", "trackedAddresses": tracked})),
        ),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unavailable"})),
            )
        }
    }
}
