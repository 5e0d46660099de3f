//! In-memory [`Checkpointer`] implementation.
//!
//! Stores every checkpoint for every thread in process memory behind a
//! `parking_lot::RwLock`. This is the crate's only shipped backend — it is
//! the full, feature-complete reference implementation, not a stub. A
//! durable backend (SQL, object storage) is left to downstream integrators.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::checkpoint::{Checkpoint, CheckpointMetadata};
use crate::error::Result;
use crate::traits::Checkpointer;

#[derive(Debug, Default)]
struct ThreadHistory {
    /// Checkpoints in save order (oldest first).
    checkpoints: Vec<Checkpoint>,
}

/// Thread-safe, in-memory [`Checkpointer`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryCheckpointer {
    // Outer map keyed by thread_id; checkpoint_id is looked up by scanning
    // the thread's history, which is small enough in practice (bounded by a
    // single invoke's step count) that a second index isn't worth the
    // bookkeeping.
    threads: Arc<RwLock<HashMap<String, ThreadHistory>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored checkpoint. Useful between test cases.
    pub fn clear(&self) {
        self.threads.write().clear();
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<String> {
        let id = checkpoint.checkpoint_id.clone();
        let mut threads = self.threads.write();
        threads
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .checkpoints
            .push(checkpoint);
        Ok(id)
    }

    async fn load(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read();
        for history in threads.values() {
            if let Some(found) =
                history.checkpoints.iter().find(|c| c.checkpoint_id == checkpoint_id)
            {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read();
        Ok(threads.get(thread_id).and_then(|h| h.checkpoints.last().cloned()))
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointMetadata>> {
        let threads = self.threads.read();
        let Some(history) = threads.get(thread_id) else {
            return Ok(Vec::new());
        };
        let mut metadata: Vec<CheckpointMetadata> =
            history.checkpoints.iter().rev().map(|c| c.metadata.clone()).collect();
        if let Some(limit) = limit {
            metadata.truncate(limit);
        }
        Ok(metadata)
    }

    async fn delete(&self, checkpoint_id: &str) -> Result<bool> {
        let mut threads = self.threads.write();
        for history in threads.values_mut() {
            let before = history.checkpoints.len();
            history.checkpoints.retain(|c| c.checkpoint_id != checkpoint_id);
            if history.checkpoints.len() != before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn delete_by_thread(&self, thread_id: &str) -> Result<usize> {
        let mut threads = self.threads.write();
        Ok(threads.remove(thread_id).map(|h| h.checkpoints.len()).unwrap_or(0))
    }

    async fn exists(&self, checkpoint_id: &str) -> Result<bool> {
        Ok(self.load(checkpoint_id).await?.is_some())
    }
}
