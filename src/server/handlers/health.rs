use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "policyquery"
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let provider_reachable = state.provider.health_check().await.unwrap_or(false);

    Ok(Json(json!({
        "status": "ok",
        "provider": state.provider.name(),
        "provider_reachable": provider_reachable,
        "active_sessions": state.registry.len(),
    })))
}
