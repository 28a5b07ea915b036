pub mod bootstrap;
pub mod config;
pub mod document;
pub mod handlers;
pub mod index;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/stats", get(handlers::health::stats_handler))
        .route("/chat", post(handlers::chat::chat_handler))
        .route("/reset", post(handlers::chat::reset_handler))
        .route("/extraction/{userid}", get(handlers::extraction::extraction_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default().include_headers(false)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
