//! BSP/Pregel execution engine: scheduler, parallel executor, driver and
//! streaming surfaces.
//!
//! A graph is built from two independent pieces:
//!
//! - A set of named **channels** ([`pregel_checkpoint::Channel`]) holding the
//!   shared state nodes read and write.
//! - A set of **nodes** ([`node::NodeDescriptor`]), each triggered by writes
//!   to one or more channels, reading some set of channels as input, and
//!   writing (optionally through a projection) to some set of channels as
//!   output.
//!
//! [`graph::EngineBuilder`] assembles both into an [`graph::Engine`], running
//! structural validation once at build time rather than discovering a
//! dangling channel reference mid-run. From there, execution is a bulk
//! synchronous parallel (BSP) loop — see [`driver`] — driven through one of
//! the surfaces in [`surface`]: `invoke`, `invoke_async`, `stream`,
//! `stream_reactive`, `invoke_reactive`, and `resume_from`.
//!
//! ```
//! use pregel_core::graph::EngineBuilder;
//! use pregel_core::node::NodeBuilder;
//! use pregel_core::context::RuntimeConfig;
//! use pregel_checkpoint::LastValueChannel;
//! use serde_json::Value;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = EngineBuilder::new()
//!     .channel(Box::new(LastValueChannel::new("input")))?
//!     .channel(Box::new(LastValueChannel::new("output")))?
//!     .node(
//!         NodeBuilder::new("uppercase")
//!             .trigger("input")
//!             .write("output")
//!             .processor(|v| Box::pin(async move {
//!                 Ok(Value::from(v.as_str().unwrap_or_default().to_uppercase()))
//!             }))
//!             .build()?,
//!     )?
//!     .config(pregel_core::context::EngineConfig {
//!         input_channels: vec!["input".to_string()],
//!         output_channels: vec!["output".to_string()],
//!         ..Default::default()
//!     })
//!     .build()?;
//!
//! let output = engine.invoke(Value::from("hi"), RuntimeConfig::default()).await?;
//! assert_eq!(output, Value::from("HI"));
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod driver;
pub mod error;
pub mod executor;
pub mod graph;
pub mod input;
pub mod node;
pub mod node_registry;
pub mod scheduler;
pub mod surface;
pub mod update;

pub use context::{EngineConfig, ExecutionContext, ExecutionFailure, ExecutionResult, ExecutionStep, RuntimeConfig};
pub use error::{EngineError, EngineResult};
pub use executor::{NodeOutcome, ParallelExecutor};
pub use graph::{Engine, EngineBuilder};
pub use node::{BackoffStrategy, NodeBuilder, NodeDescriptor, Processor, Projection, RetryPolicy};
pub use node_registry::NodeRegistry;
