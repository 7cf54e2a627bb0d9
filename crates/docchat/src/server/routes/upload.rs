//! Document upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::UploadResponse;

/// Multipart field carrying the document
const FILE_FIELD: &str = "file";

/// POST /upload - Index one document and open a session for it
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::load("upload", format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::load("upload", "File field has no filename"))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::load(&filename, format!("Failed to read file: {}", e)))?;

        tracing::info!("Processing upload: {} ({} bytes)", filename, data.len());

        let (pipeline, chunk_count) = match state.ingest().ingest(&filename, data.to_vec()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Upload of {} failed: {}", filename, e);
                return Err(e);
            }
        };

        let session_id = state
            .sessions()
            .create(Arc::new(pipeline), filename.clone(), chunk_count);

        tracing::info!(
            "Indexed {} ({} chunks) as session {} in {:.1}s",
            filename,
            chunk_count,
            session_id,
            start.elapsed().as_secs_f64()
        );

        return Ok(Json(UploadResponse {
            session_id,
            filename,
            chunk_count,
        }));
    }

    Err(Error::load("upload", "Missing multipart field 'file'"))
}
