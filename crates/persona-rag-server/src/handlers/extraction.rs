use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::chat::ExtractionResponse;
use crate::services::conversation::ConversationManager;

pub async fn extraction_handler(
    State(manager): State<Arc<ConversationManager>>,
    Path(userid): Path<String>,
) -> Json<ExtractionResponse> {
    Json(manager.extraction(&userid).await)
}
