//! Opt-in on-disk snapshots of session indices.
//!
//! Persistence is independent of the in-memory path: nothing here runs
//! unless a persist directory is configured. A snapshot records the
//! embedding model that produced its vectors and refuses to load under a
//! different one, since vectors from different models are not comparable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::index::FlatIndex;
use crate::core::errors::ApiError;
use crate::document::DocumentChunk;

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub embedding_model: String,
    pub vectors: Vec<Vec<f32>>,
    pub chunks: Vec<DocumentChunk>,
}

impl IndexSnapshot {
    pub fn from_index(index: &FlatIndex) -> Self {
        Self {
            embedding_model: index.embedding_model().to_string(),
            vectors: index.vectors().to_vec(),
            chunks: index.chunks().to_vec(),
        }
    }

    pub fn into_index(self) -> Result<FlatIndex, ApiError> {
        FlatIndex::from_parts(self.embedding_model, self.vectors, self.chunks)
    }

    /// Writes the snapshot via a temp file and rename, so a crash mid-write
    /// never leaves a truncated snapshot behind.
    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }

        let payload = serde_json::to_vec(self).map_err(ApiError::internal)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, payload).map_err(ApiError::internal)?;
        fs::rename(&tmp_path, path).map_err(ApiError::internal)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let payload = fs::read(path).map_err(ApiError::internal)?;
        serde_json::from_slice(&payload).map_err(ApiError::internal)
    }

    /// Loads the snapshot for `session_id` if one exists and was produced by
    /// `embedding_model`. A missing snapshot is `None`; a model mismatch is
    /// treated the same way, with a log line, so the session is rebuilt
    /// rather than served stale vectors.
    pub fn load_for_session(
        dir: &Path,
        session_id: &str,
        embedding_model: &str,
    ) -> Result<Option<FlatIndex>, ApiError> {
        let path = snapshot_path(dir, session_id);
        if !path.exists() {
            return Ok(None);
        }

        let snapshot = Self::load(&path)?;
        if snapshot.embedding_model != embedding_model {
            tracing::warn!(
                "snapshot for session '{}' was built with model '{}', expected '{}'; ignoring",
                session_id,
                snapshot.embedding_model,
                embedding_model
            );
            return Ok(None);
        }

        Ok(Some(snapshot.into_index()?))
    }
}

/// Snapshot file for a session. Session ids are caller-supplied, so every
/// character that could escape the directory is mapped away.
pub fn snapshot_path(dir: &Path, session_id: &str) -> PathBuf {
    let safe: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("index_{}.json", safe))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatIndex {
        FlatIndex::from_parts(
            "test-model".to_string(),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![
                DocumentChunk {
                    content: "first".to_string(),
                    document_name: "doc.txt".to_string(),
                    clause_number: "1.1".to_string(),
                },
                DocumentChunk {
                    content: "second".to_string(),
                    document_name: "doc.txt".to_string(),
                    clause_number: "Part_2".to_string(),
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index();
        let path = snapshot_path(dir.path(), "session-1");

        IndexSnapshot::from_index(&index).save(&path).unwrap();
        let restored = IndexSnapshot::load_for_session(dir.path(), "session-1", "test-model")
            .unwrap()
            .unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.chunks()[0].content, "first");
        assert_eq!(restored.vectors()[1], vec![3.0, 4.0]);
    }

    #[test]
    fn missing_snapshot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();

        let result =
            IndexSnapshot::load_for_session(dir.path(), "absent", "test-model").unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn model_mismatch_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index();
        let path = snapshot_path(dir.path(), "session-1");
        IndexSnapshot::from_index(&index).save(&path).unwrap();

        let result =
            IndexSnapshot::load_for_session(dir.path(), "session-1", "other-model").unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn snapshot_paths_cannot_escape_the_directory() {
        let dir = PathBuf::from("/snapshots");

        let path = snapshot_path(&dir, "../../etc/passwd");

        assert!(path.starts_with("/snapshots"));
        assert!(!path.to_string_lossy().contains(".."));
    }
}
