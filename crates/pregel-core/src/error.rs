//! Error taxonomy for the BSP execution engine.
//!
//! [`EngineError`] is the public failure type of every invocation surface in
//! this crate. It wraps [`pregel_checkpoint::ChannelError`] (channel-contract
//! violations) via `#[from]` rather than re-declaring those variants, so a
//! `?` on a channel operation composes directly with node/driver code.
//!
//! # Recovery guidance
//!
//! - `NodeFailure` / `AttemptTimeout` — the node's retry policy already had
//!   its chance; these surface only after retries are exhausted. Check the
//!   node's configured `max_attempts`.
//! - `WallClockTimeout` — the whole invocation exceeded its configured
//!   `timeout`; partial step history is still available on
//!   [`crate::context::ExecutionResult`].
//! - `Interrupted` — the caller set the context's interrupt flag; not a bug.
//! - `GraphValidationFailure` — a structural problem (empty trigger set, two
//!   nodes with the same name) caught before execution starts.
//! - `CheckpointFailure` — a checkpoint save/load failed. Per the checkpoint
//!   protocol, *save* failures during normal execution are logged and
//!   swallowed, not raised as this variant; it surfaces only from explicit
//!   `resume_from` calls.
//! - `ResumeNotConfigured` — `resume_from` was called without a checkpointer
//!   attached.

use std::time::Duration;

use pregel_checkpoint::ChannelError;
use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A channel rejected a read or an update.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A node exhausted its retry policy (or had none) and its last attempt
    /// returned an error.
    #[error("node '{node}' failed: {error}")]
    NodeFailure { node: String, error: String },

    /// A single attempt of a node exceeded its configured per-attempt
    /// timeout.
    #[error("node '{node}' timed out after {duration_ms}ms")]
    AttemptTimeout { node: String, duration_ms: u64 },

    /// The whole invocation exceeded its configured wall-clock timeout.
    #[error("execution exceeded wall-clock timeout of {duration_ms}ms")]
    WallClockTimeout { duration_ms: u64 },

    /// The execution context's interrupt flag was observed set.
    #[error("execution was interrupted")]
    Interrupted,

    /// The graph failed structural validation before execution started.
    #[error("graph validation failed: {0}")]
    GraphValidationFailure(String),

    /// A checkpoint operation (save, load, restore) failed.
    #[error("checkpoint operation failed: {0}")]
    CheckpointFailure(#[from] pregel_checkpoint::CheckpointError),

    /// `resume_from` was called but no checkpointer is attached to this
    /// driver.
    #[error("cannot resume: no checkpointer is configured")]
    ResumeNotConfigured,

    /// Escape hatch for configuration or environment errors that don't fit
    /// the other variants.
    #[error("{0}")]
    Configuration(String),
}

impl EngineError {
    pub fn node_failure(node: impl Into<String>, error: impl std::fmt::Display) -> Self {
        EngineError::NodeFailure { node: node.into(), error: error.to_string() }
    }

    pub fn attempt_timeout(node: impl Into<String>, duration: Duration) -> Self {
        EngineError::AttemptTimeout { node: node.into(), duration_ms: duration.as_millis() as u64 }
    }

    pub fn wall_clock_timeout(duration: Duration) -> Self {
        EngineError::WallClockTimeout { duration_ms: duration.as_millis() as u64 }
    }
}
