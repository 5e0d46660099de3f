//! Persisted-state layout: the contents of one checkpoint and its metadata.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::channel::ChannelKind;
use crate::error::{CheckpointError, Result};

/// One persisted channel's state: its kind (so it can be reconstructed
/// without a registry lookup at deserialize time) and its checkpoint value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelState {
    pub kind: ChannelKind,
    pub value: Value,
}

/// Where a checkpoint came from. Mirrors the three places the BSP driver
/// takes a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    /// Taken immediately after seeding input channels, before step 0.
    Input,
    /// Taken after a successful Update phase.
    Loop,
    /// Taken by an explicit user-triggered snapshot outside the loop.
    Update,
}

/// Everything about a checkpoint except the channel states themselves:
/// identity, provenance, and free-form tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    pub step_number: u64,
    /// Distinct node names executed up to and including this checkpoint.
    /// Order is not meaningful.
    pub executed_nodes: Vec<String>,
    pub parent_checkpoint_id: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A complete, persistable snapshot of one thread's execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub thread_id: String,
    pub step_number: u64,
    pub channel_states: HashMap<String, ChannelState>,
    /// Opaque to the engine; callers round-trip whatever their user context
    /// type serializes to here.
    pub user_context: Value,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        step_number: u64,
        channel_states: HashMap<String, ChannelState>,
        user_context: Value,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            checkpoint_id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            step_number,
            channel_states,
            user_context,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Encode to the implementation-defined byte layout (`bincode`) used by
    /// checkpointer backends that need an actual byte boundary rather than
    /// the in-process `Checkpoint` value (e.g. writing to a file or a
    /// key-value store).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(CheckpointError::from)
    }

    /// Inverse of [`Checkpoint::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(CheckpointError::from)
    }
}
