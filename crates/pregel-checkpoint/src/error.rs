//! Error types for the channel and checkpoint layer.

use thiserror::Error;

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Failures that can arise from a single channel's update/read contract.
///
/// These are distinct from [`CheckpointError`]: a channel error is a contract
/// violation on one channel (read-before-write, two writers where only one is
/// legal, reading a value that can never be persisted), while a checkpoint
/// error is about the persistence layer itself (storage, serialization, not
/// found).
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// `get()` was called on a channel that has never been written, or whose
    /// value was consumed (Ephemeral channels).
    #[error("channel '{0}' is empty")]
    EmptyChannel(String),

    /// The update batch violated the channel kind's legality rule (e.g. two
    /// non-null values delivered to a `LastValue` channel in one step).
    #[error("invalid update to channel '{channel}': {reason}")]
    InvalidUpdate {
        /// Name of the channel that rejected the batch.
        channel: String,
        /// Human-readable reason the batch was rejected.
        reason: String,
    },

    /// `checkpoint()` was called on a channel kind that can never be
    /// persisted (Ephemeral).
    #[error("channel '{0}' does not support checkpointing")]
    NotCheckpointable(String),
}

impl ChannelError {
    /// Name of the channel the error originated from, if applicable.
    pub fn channel_name(&self) -> Option<&str> {
        match self {
            ChannelError::EmptyChannel(name) => Some(name),
            ChannelError::InvalidUpdate { channel, .. } => Some(channel),
            ChannelError::NotCheckpointable(name) => Some(name),
        }
    }
}

/// Errors that can occur while saving, loading, or listing checkpoints.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists for the given id or thread.
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// A channel rejected an update or read during snapshot/restore.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// JSON (de)serialization of a checkpoint or one of its channel values
    /// failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary (de)serialization of a checkpoint failed. Used by the
    /// `Vec<u8>` escape hatch for checkpointer backends that need an actual
    /// byte boundary rather than the in-process JSON representation.
    #[error("binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// The storage backend itself failed (connection, query, write).
    #[error("storage error: {0}")]
    Storage(String),

    /// The checkpoint's shape was structurally invalid (missing required
    /// field, unknown channel-kind tag, etc.).
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O failure underneath a storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Escape hatch for backend-specific failures that don't map cleanly
    /// onto the other variants.
    #[error("{0}")]
    Custom(String),
}
