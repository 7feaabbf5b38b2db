use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

const UPLOAD_LIMIT_BYTES: usize = 512 * 1024 * 1024;

// API Routes - what the chat UI talks to
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Session lifecycle
            .route("/sessions", post(handlers::api::create_session))
            .route("/sessions/{id}", delete(handlers::api::delete_session))
            // Questions
            .route("/sessions/{id}/ask", post(handlers::api::ask))
            // Database selection
            .route("/sessions/{id}/database", post(handlers::api::select_database))
            .route(
                "/sessions/{id}/upload",
                post(handlers::api::upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
            )
            // Session views
            .route("/sessions/{id}/schema", get(handlers::api::get_schema))
            .route("/sessions/{id}/history", get(handlers::api::get_history))
            .route("/sessions/{id}/analytics", get(handlers::api::get_analytics))
            .route("/sessions/{id}/insights", get(handlers::api::get_insights))
            // Exports
            .route("/sessions/{id}/export/history.csv", get(handlers::api::export_history))
            .route("/sessions/{id}/export/result.csv", get(handlers::api::export_result))
            // Maintenance
            .route("/sessions/{id}/cache/clear", post(handlers::api::clear_cache))
            .route("/sessions/{id}/chat/clear", post(handlers::api::clear_chat))
            .route("/sessions/{id}/reset", post(handlers::api::reset))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
