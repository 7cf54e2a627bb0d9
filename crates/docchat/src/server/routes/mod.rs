//! Routes for upload, query and streaming chat

pub mod chat;
pub mod query;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all document chat routes
pub fn chat_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/query", post(query::query_document))
        .route("/chat/:session_id", get(chat::chat_socket))
}
