use async_trait::async_trait;

use super::types::EmbedTask;
use crate::core::errors::ApiError;

/// Boundary to the external embedding and generation services.
///
/// One embedding call covers a whole batch; the provider returns one vector
/// per input string in the same order. There is no retry, backoff, or
/// partial-failure handling at this seam: a failed call fails the batch.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name (e.g. "gemini")
    fn name(&self) -> &str;

    /// identifier of the embedding model, recorded in index snapshots
    fn embedding_model(&self) -> &str;

    /// check if the provider is reachable
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// embed a batch of texts, one vector per input in order
    async fn embed(&self, inputs: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>, ApiError>;

    /// single-prompt completion, returning the raw response text
    async fn generate(&self, prompt: &str) -> Result<String, ApiError>;
}
