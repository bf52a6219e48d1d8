use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::document::{parse_document, Chunker, ChunkerConfig, DocumentChunk};
use crate::state::AppState;

/// Uploads a document into a session: the file is parsed, chunked, embedded
/// and published as that session's index, replacing any prior one.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut session_id: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("invalid multipart body: {}", err)))?
    {
        let field_name = field.name().map(|name| name.to_string());
        match field_name.as_deref() {
            Some("session_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(format!("invalid session_id: {}", err)))?;
                session_id = Some(text);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(sanitize_filename)
                    .ok_or_else(|| {
                        ApiError::BadRequest("file field must carry a filename".to_string())
                    })?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(format!("invalid file body: {}", err)))?;
                upload = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let session_id = session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing 'session_id' field".to_string()))?;
    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;

    let chunks = ingest_bytes(&state, &filename, &bytes).await?;
    let chunk_count = chunks.len();

    let handle = state.registry.get_or_create(&session_id);
    handle.rebuild(state.provider.as_ref(), chunks).await?;

    if let Err(err) = state.registry.snapshot(&session_id) {
        tracing::warn!("failed to snapshot session '{}': {}", session_id, err);
    }

    tracing::info!(
        "indexed '{}' into session '{}' ({} chunks)",
        filename,
        session_id,
        chunk_count
    );

    Ok(Json(json!({
        "session_id": session_id,
        "filename": filename,
        "message": format!(
            "Document processed and indexed successfully. Total chunks: {}",
            chunk_count
        ),
    })))
}

/// Writes the uploaded bytes under the uploads directory, extracts their
/// text, removes the file, and chunks the text. Shared with the bulk flow.
pub(crate) async fn ingest_bytes(
    state: &AppState,
    filename: &str,
    bytes: &[u8],
) -> Result<Vec<DocumentChunk>, ApiError> {
    let file_path = state
        .paths
        .uploads_dir
        .join(format!("{}_{}", Uuid::new_v4(), filename));

    tokio::fs::write(&file_path, bytes)
        .await
        .map_err(ApiError::internal)?;

    // PDF extraction is CPU-bound; keep it off the runtime workers.
    let parse_path = file_path.clone();
    let parsed = tokio::task::spawn_blocking(move || parse_document(&parse_path))
        .await
        .map_err(ApiError::internal);

    let _ = tokio::fs::remove_file(&file_path).await;
    let raw_text = parsed??;

    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: state.retrieval.chunk_size,
        chunk_overlap: state.retrieval.chunk_overlap,
    });

    Ok(chunker.chunk(&raw_text, filename))
}

/// Uploaded filenames are caller-controlled; keep only the final path
/// component.
fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd.txt"), "passwd.txt");
        assert_eq!(sanitize_filename("policy.pdf"), "policy.pdf");
    }

    #[test]
    fn sanitize_filename_defaults_when_empty() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
    }
}
