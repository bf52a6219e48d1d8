use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::answer::{generate_answer, parse_query, Answer};
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub session_id: String,
    pub question: String,
}

/// Answers a question against the documents indexed for a session.
///
/// The question is classified first, and the resulting intent/details string
/// is what gets embedded for the search; the original question is what the
/// synthesizer answers.
pub async fn query_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Answer>, ApiError> {
    let handle = state.registry.get_or_create(&request.session_id);

    let parsed = parse_query(state.provider.as_ref(), &request.question).await?;
    let results = handle
        .search(
            state.provider.as_ref(),
            &parsed.search_string(),
            state.retrieval.top_k,
        )
        .await?;

    if results.is_empty() {
        return Err(ApiError::NotFound(
            "Could not find relevant clauses for your query.".to_string(),
        ));
    }

    let answer = generate_answer(state.provider.as_ref(), &request.question, &results).await?;
    Ok(Json(answer))
}
