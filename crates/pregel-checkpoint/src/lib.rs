//! # pregel-checkpoint
//!
//! Channel kinds, the channel registry, and the checkpoint protocol for the
//! `pregel-rt` BSP runtime. This crate has no dependency on the execution
//! engine (`pregel-core`) — it is the state layer the engine is built on top
//! of, and is usable on its own by anything that just needs versioned,
//! mergeable state cells.
//!
//! ## Channel kinds
//!
//! - [`LastValueChannel`] — at most one writer per step; last write wins.
//! - [`TopicChannel`] — ordered, optionally deduplicated, optionally
//!   accumulating list.
//! - [`BinaryReduceChannel`] — associative fold over the batch (sum, append,
//!   or a custom operator).
//! - [`EphemeralChannel`] — single value, consumable exactly once, never
//!   checkpointed.
//!
//! ## Checkpointing
//!
//! [`Checkpointer`] is the storage-backend trait; [`InMemoryCheckpointer`]
//! is the shipped in-process implementation. [`Checkpoint`] is the
//! persisted-state record.
//!
//! ```
//! use pregel_checkpoint::{ChannelRegistry, LastValueChannel, Channel};
//!
//! let mut registry = ChannelRegistry::new();
//! registry.register(Box::new(LastValueChannel::new("greeting"))).unwrap();
//! ```

pub mod channel;
pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod registry;
pub mod traits;

pub use channel::{
    BinaryReduceChannel, Channel, ChannelKind, EphemeralChannel, LastValueChannel, TopicChannel,
};
pub use checkpoint::{Checkpoint, ChannelState, CheckpointMetadata, CheckpointSource};
pub use error::{ChannelError, ChannelResult, CheckpointError, Result};
pub use memory::InMemoryCheckpointer;
pub use registry::ChannelRegistry;
pub use traits::Checkpointer;
