use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::info;

use crate::models::chat::{
    ChatRequest, ChatResponse, ResetRequest, ResetResponse, SourceInfo, TurnStatusLabel,
};
use crate::services::conversation::ConversationManager;
use crate::utils::error::ApiError;

pub async fn chat_handler(
    State(manager): State<Arc<ConversationManager>>,
    Json(request): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let user_input = request.user_input.trim();
    if user_input.is_empty() {
        return Err(ApiError::BadRequest("Please provide a message".to_string()));
    }

    info!(
        "Chat request: userid={:?}, message_len={}",
        request.userid,
        user_input.len()
    );

    // the turn runs to completion even if this request is dropped
    let outcome = manager
        .spawn_turn(user_input.to_string(), request.userid.clone())
        .await
        .map_err(|e| ApiError::InternalError(format!("Turn task failed: {}", e)))?;
    let sources = outcome.sources.iter().map(SourceInfo::from).collect();

    let (status, response) = match outcome.reply {
        Ok(reply) => (
            StatusCode::OK,
            ChatResponse {
                userid: outcome.session_id,
                next_question: Some(reply),
                status: TurnStatusLabel::Ok,
                error: None,
                sources,
            },
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ChatResponse {
                userid: outcome.session_id,
                next_question: None,
                status: TurnStatusLabel::Error,
                error: Some(e.user_message().to_string()),
                sources: Vec::new(),
            },
        ),
    };

    Ok((status, Json(response)))
}

pub async fn reset_handler(
    State(manager): State<Arc<ConversationManager>>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    let userid = request.userid.trim();
    if userid.is_empty() {
        return Err(ApiError::BadRequest("userid is required".to_string()));
    }

    manager.reset(userid);
    Ok(Json(ResetResponse {
        userid: userid.to_string(),
        status: TurnStatusLabel::Ok,
    }))
}
