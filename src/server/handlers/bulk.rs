//! Bulk endpoint: fetch documents by URL, index them in a fresh session,
//! and answer a list of questions.
//!
//! Failure handling is asymmetric on purpose: any per-document failure
//! aborts the whole request before an index is built, while a per-question
//! failure degrades to a placeholder answer so one bad question does not
//! abort the rest.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::documents::ingest_bytes;
use crate::answer::{generate_answer, Answer};
use crate::core::errors::ApiError;
use crate::core::security::require_bearer;
use crate::document::DocumentChunk;
use crate::retrieval::SessionHandle;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Document URLs to fetch and index.
    pub documents: Vec<String>,
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub answers: Vec<String>,
}

pub async fn run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    require_bearer(&headers, &state.api_token)?;
    let response = run_bulk(&state, request).await?;
    Ok(Json(response))
}

pub async fn run_bulk(state: &AppState, request: RunRequest) -> Result<RunResponse, ApiError> {
    let client = reqwest::Client::builder()
        .timeout(state.retrieval.download_timeout)
        .build()
        .map_err(ApiError::internal)?;

    let mut all_chunks: Vec<DocumentChunk> = Vec::new();
    for url in &request.documents {
        let chunks = fetch_and_chunk(state, &client, url).await.map_err(|err| {
            tracing::warn!("bulk ingestion failed for {}: {}", url, err);
            ApiError::BadRequest(format!("Failed to download or process document: {}", url))
        })?;
        all_chunks.extend(chunks);
    }

    if all_chunks.is_empty() {
        return Err(ApiError::BadRequest(
            "No documents could be processed from the provided URLs.".to_string(),
        ));
    }

    let session_id = format!("run_{}", Utc::now().timestamp_millis());
    let handle = state.registry.get_or_create(&session_id);
    handle.rebuild(state.provider.as_ref(), all_chunks).await?;

    let mut answers = Vec::with_capacity(request.questions.len());
    for question in &request.questions {
        answers.push(answer_question(state, &handle, question).await);
    }

    Ok(RunResponse { answers })
}

async fn answer_question(state: &AppState, handle: &SessionHandle, question: &str) -> String {
    match try_answer(state, handle, question).await {
        Ok(Some(answer)) => answer.justification,
        Ok(None) => {
            "Could not find relevant information in the provided documents to answer this question."
                .to_string()
        }
        Err(err) => {
            tracing::warn!("failed to answer '{}': {}", question, err);
            format!(
                "An error occurred while processing the question: '{}'",
                question
            )
        }
    }
}

async fn try_answer(
    state: &AppState,
    handle: &SessionHandle,
    question: &str,
) -> Result<Option<Answer>, ApiError> {
    let results = handle
        .search(state.provider.as_ref(), question, state.retrieval.top_k)
        .await?;

    if results.is_empty() {
        return Ok(None);
    }

    let answer = generate_answer(state.provider.as_ref(), question, &results).await?;
    Ok(Some(answer))
}

async fn fetch_and_chunk(
    state: &AppState,
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<DocumentChunk>, ApiError> {
    let response = client.get(url).send().await.map_err(ApiError::upstream)?;
    let response = response.error_for_status().map_err(ApiError::upstream)?;
    let bytes = response.bytes().await.map_err(ApiError::upstream)?;

    let filename = file_name_from_url(url);
    ingest_bytes(state, &filename, &bytes).await
}

/// Last path segment of the URL, with any query string or fragment dropped.
fn file_name_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("document")
        .to_string()
}
