//! The [`Checkpointer`] trait: the storage-backend seam for checkpoint
//! persistence.
//!
//! The BSP driver depends only on this trait, never on a concrete storage
//! technology. The crate ships one implementation, [`crate::memory::InMemoryCheckpointer`];
//! a durable backend (SQL, object storage, a KV store) is a downstream
//! concern and is deliberately not shipped here.
//!
//! # Implementing a custom backend
//!
//! ```rust,ignore
//! use pregel_checkpoint::{Checkpointer, Checkpoint, CheckpointMetadata, Result};
//! use async_trait::async_trait;
//!
//! struct MyBackend { /* ... */ }
//!
//! #[async_trait]
//! impl Checkpointer for MyBackend {
//!     async fn save(&self, checkpoint: Checkpoint) -> Result<String> {
//!         // persist `checkpoint`, return its id
//!         todo!()
//!     }
//!     // ... remaining methods
//! }
//! ```

use async_trait::async_trait;

use crate::checkpoint::{Checkpoint, CheckpointMetadata};
use crate::error::Result;

/// Storage-backend abstraction for checkpoint persistence.
///
/// All methods operate per-thread: a `thread_id` identifies one independent
/// execution history, and `checkpoint_id` identifies one point within it.
/// Implementations must be `Send + Sync` since the driver may hold an
/// `Arc<dyn Checkpointer>` shared across concurrently executing invocations.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist a checkpoint, returning its id (normally
    /// `checkpoint.checkpoint_id`, but backends are free to assign their own
    /// identifier scheme).
    async fn save(&self, checkpoint: Checkpoint) -> Result<String>;

    /// Load one checkpoint by id. `Ok(None)` if it does not exist.
    async fn load(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>>;

    /// Load the most recently saved checkpoint for a thread. `Ok(None)` if
    /// the thread has never been checkpointed.
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// List metadata for up to `limit` checkpoints belonging to a thread,
    /// newest first. `limit = None` returns the full history.
    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointMetadata>>;

    /// Delete one checkpoint. Returns `true` if it existed.
    async fn delete(&self, checkpoint_id: &str) -> Result<bool>;

    /// Delete every checkpoint belonging to a thread. Returns the number
    /// deleted.
    async fn delete_by_thread(&self, thread_id: &str) -> Result<usize>;

    /// Whether a checkpoint with this id exists, without loading its body.
    async fn exists(&self, checkpoint_id: &str) -> Result<bool> {
        Ok(self.load(checkpoint_id).await?.is_some())
    }
}
