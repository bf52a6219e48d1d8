//! Bounded session registry.
//!
//! Sessions are keyed by a caller-supplied opaque id and live in a bounded
//! LRU cache with an idle TTL, so abandoned sessions age out instead of
//! growing the process without bound. Each session publishes its index as an
//! immutable `Arc<FlatIndex>` swapped in one step: a search racing a rebuild
//! sees either the old complete index or the new one, never a mixture.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use moka::sync::Cache;

use super::index::{FlatIndex, ScoredChunk};
use super::persistence::{snapshot_path, IndexSnapshot};
use crate::core::errors::ApiError;
use crate::document::DocumentChunk;
use crate::llm::LlmProvider;

pub struct SessionHandle {
    session_id: String,
    index: RwLock<Option<Arc<FlatIndex>>>,
}

impl SessionHandle {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            index: RwLock::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The currently published index, if any build has completed.
    pub fn current(&self) -> Option<Arc<FlatIndex>> {
        // The lock only ever guards a fully constructed Arc, so a poisoned
        // guard still holds a consistent value.
        let guard = self.index.read().unwrap_or_else(|err| err.into_inner());
        guard.clone()
    }

    /// Publishes a complete index, discarding whatever was there before.
    pub fn publish(&self, index: FlatIndex) {
        let mut guard = self.index.write().unwrap_or_else(|err| err.into_inner());
        *guard = Some(Arc::new(index));
    }

    /// Embeds every chunk, assembles a fresh index, and publishes it.
    /// Returns the number of indexed chunks.
    pub async fn rebuild(
        &self,
        provider: &dyn LlmProvider,
        chunks: Vec<DocumentChunk>,
    ) -> Result<usize, ApiError> {
        let index = FlatIndex::build(provider, chunks).await?;
        let count = index.len();
        self.publish(index);
        Ok(count)
    }

    /// Embeds `query` and searches the published index.
    ///
    /// Fails with a "not built" error when no build has completed for this
    /// session yet.
    pub async fn search(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        let index = self.current().ok_or_else(|| {
            ApiError::NotFound(format!(
                "index not built for session '{}'; upload a document first",
                self.session_id
            ))
        })?;

        index.search(provider, query, top_k).await
    }
}

pub struct SessionRegistry {
    sessions: Cache<String, Arc<SessionHandle>>,
    persist_dir: Option<PathBuf>,
    embedding_model: String,
}

impl SessionRegistry {
    pub fn new(
        capacity: u64,
        idle_ttl: Duration,
        persist_dir: Option<PathBuf>,
        embedding_model: String,
    ) -> Self {
        let sessions = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle_ttl)
            .build();

        Self {
            sessions,
            persist_dir,
            embedding_model,
        }
    }

    /// Returns the session for `session_id`, creating it if absent. When a
    /// persist directory is configured, a registry miss first tries to
    /// restore the session's snapshot from disk.
    pub fn get_or_create(&self, session_id: &str) -> Arc<SessionHandle> {
        self.sessions.get_with(session_id.to_string(), || {
            let handle = Arc::new(SessionHandle::new(session_id));

            if let Some(dir) = &self.persist_dir {
                match IndexSnapshot::load_for_session(dir, session_id, &self.embedding_model) {
                    Ok(Some(index)) => {
                        tracing::info!(
                            "restored session '{}' from snapshot ({} chunks)",
                            session_id,
                            index.len()
                        );
                        handle.publish(index);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(
                            "failed to restore snapshot for session '{}': {}",
                            session_id,
                            err
                        );
                    }
                }
            }

            handle
        })
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(session_id)
    }

    pub fn evict(&self, session_id: &str) {
        self.sessions.invalidate(session_id);
    }

    pub fn len(&self) -> u64 {
        self.sessions.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the session's published index to its snapshot file. A no-op
    /// unless persistence is configured and the session has an index.
    pub fn snapshot(&self, session_id: &str) -> Result<(), ApiError> {
        let Some(dir) = &self.persist_dir else {
            return Ok(());
        };
        let Some(handle) = self.get(session_id) else {
            return Ok(());
        };
        let Some(index) = handle.current() else {
            return Ok(());
        };

        IndexSnapshot::from_index(&index).save(&snapshot_path(dir, session_id))
    }
}
