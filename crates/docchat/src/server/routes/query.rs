//! Synchronous query endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /query - Answer a question about an uploaded document
pub async fn query_document(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();
    let session = state.sessions().get(&request.session_id)?;

    tracing::debug!("Query on session {}: \"{}\"", request.session_id, request.query);

    let response = {
        let _guard = session.lock_queries().await;
        session.pipeline().answer(&request.query).await?
    };

    tracing::info!(
        "Answered query on session {} ({} chars) in {}ms",
        request.session_id,
        response.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(QueryResponse { response }))
}
