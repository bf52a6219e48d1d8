//! Immutable flat (exhaustive) vector index.
//!
//! A build embeds every chunk in one batched call and produces a complete
//! index value; searches compute L2 distance against every stored vector.
//! The vector table and the chunk table are parallel: position i of one
//! corresponds to position i of the other, and both always have equal
//! length. Rebuilding means constructing a fresh `FlatIndex`; nothing is
//! mutated in place.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::document::DocumentChunk;
use crate::llm::{EmbedTask, LlmProvider};

/// A retrieved chunk with its distance to the query vector. Smaller is
/// closer (squared Euclidean, which preserves L2 ordering).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub distance: f32,
}

pub struct FlatIndex {
    embedding_model: String,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<DocumentChunk>,
}

impl FlatIndex {
    /// Embeds every chunk's content in one batched call and assembles the
    /// index. The prior index for a session, if any, is simply dropped when
    /// the new one is published; a build is never additive.
    pub async fn build(
        provider: &dyn LlmProvider,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Self, ApiError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = provider.embed(&texts, EmbedTask::Document).await?;

        if vectors.len() != chunks.len() {
            return Err(ApiError::Internal(format!(
                "embedding count {} does not match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        Ok(Self {
            embedding_model: provider.embedding_model().to_string(),
            vectors,
            chunks,
        })
    }

    /// Reassembles an index from snapshot parts. Fails if the tables are not
    /// parallel.
    pub fn from_parts(
        embedding_model: String,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Self, ApiError> {
        if vectors.len() != chunks.len() {
            return Err(ApiError::Internal(format!(
                "snapshot has {} vectors but {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            embedding_model,
            vectors,
            chunks,
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Exhaustive nearest-neighbor search over a pre-embedded query.
    ///
    /// Returns up to `top_k` chunks in ascending-distance order; asking for
    /// more results than the index holds returns everything. Exact-distance
    /// ties keep insertion order (the sort is stable).
    pub fn search_embedded(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        let Some(first) = self.vectors.first() else {
            return Ok(Vec::new());
        };

        if query.len() != first.len() {
            return Err(ApiError::Internal(format!(
                "query embedding has dimension {} but the index holds dimension {}",
                query.len(),
                first.len()
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, l2_distance(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                distance,
            })
            .collect())
    }

    /// Embeds `query` and searches.
    pub async fn search(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        let mut embedded = provider.embed(&[query.to_string()], EmbedTask::Query).await?;
        let query_vector = embedded.pop().ok_or_else(|| {
            ApiError::Upstream("embedding service returned no vector for the query".to_string())
        })?;

        self.search_embedded(&query_vector, top_k)
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> DocumentChunk {
        DocumentChunk {
            content: content.to_string(),
            document_name: "doc.txt".to_string(),
            clause_number: "Part_1".to_string(),
        }
    }

    fn index(vectors: Vec<Vec<f32>>) -> FlatIndex {
        let chunks = (0..vectors.len())
            .map(|i| chunk(&format!("chunk {}", i)))
            .collect();
        FlatIndex::from_parts("test-model".to_string(), vectors, chunks).unwrap()
    }

    #[test]
    fn results_are_ordered_by_ascending_distance() {
        let index = index(vec![
            vec![10.0, 0.0],
            vec![1.0, 0.0],
            vec![5.0, 0.0],
        ]);

        let results = index.search_embedded(&[0.0, 0.0], 3).unwrap();

        let contents: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 1", "chunk 2", "chunk 0"]);
        assert!(results[0].distance <= results[1].distance);
        assert!(results[1].distance <= results[2].distance);
    }

    #[test]
    fn top_k_larger_than_index_returns_everything() {
        let index = index(vec![vec![1.0], vec![2.0]]);

        let results = index.search_embedded(&[0.0], 10).unwrap();

        assert_eq!(results.len(), 2);
    }

    #[test]
    fn top_k_truncates_results() {
        let index = index(vec![vec![1.0], vec![2.0], vec![3.0]]);

        let results = index.search_embedded(&[0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
    }

    #[test]
    fn equal_distances_keep_insertion_order() {
        let index = index(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]]);

        let results = index.search_embedded(&[0.0, 0.0], 3).unwrap();

        let contents: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 0", "chunk 1", "chunk 2"]);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let index = index(vec![vec![1.0, 0.0]]);

        let result = index.search_embedded(&[1.0, 0.0, 0.0], 1);

        assert!(result.is_err());
    }

    #[test]
    fn mismatched_parts_are_rejected() {
        let result = FlatIndex::from_parts(
            "test-model".to_string(),
            vec![vec![1.0]],
            vec![chunk("a"), chunk("b")],
        );

        assert!(result.is_err());
    }

    #[test]
    fn empty_index_returns_no_results() {
        let index = index(vec![]);

        let results = index.search_embedded(&[1.0], 5).unwrap();

        assert!(results.is_empty());
    }
}
