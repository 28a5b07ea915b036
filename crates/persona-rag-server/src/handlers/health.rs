use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::models::chat::StatsResponse;
use crate::services::conversation::ConversationManager;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn stats_handler(State(manager): State<Arc<ConversationManager>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        api_stats: manager.stats(),
        vectorstore_ready: manager.is_ready(),
        active_sessions: manager.active_sessions(),
    })
}
