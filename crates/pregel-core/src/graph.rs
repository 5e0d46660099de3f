//! Thin graph-assembly surface: wires a [`ChannelRegistry`] template and a
//! [`NodeRegistry`] into an [`Engine`].
//!
//! Deliberately minimal — a fluent DSL, visualization, or elaborate graph
//! heuristics are an external, thin-adapter concern. What lives here is only
//! what the driver needs before it can run: a place to register channels and
//! nodes, and the structural checks that must happen once, at build time,
//! rather than surprising a step mid-run as an `EmptyChannel` or
//! `InvalidUpdate`.

use std::sync::Arc;

use pregel_checkpoint::{Channel, ChannelRegistry, Checkpointer};

use crate::context::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::node::NodeDescriptor;
use crate::node_registry::NodeRegistry;

/// Accumulates channels and nodes, then freezes them into an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    channels: ChannelRegistry,
    nodes: NodeRegistry,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { channels: ChannelRegistry::new(), nodes: NodeRegistry::new(), config: EngineConfig::default() }
    }

    pub fn channel(mut self, channel: Box<dyn Channel>) -> EngineResult<Self> {
        self.channels.register(channel)?;
        Ok(self)
    }

    pub fn node(mut self, node: NodeDescriptor) -> EngineResult<Self> {
        self.nodes.register(node)?;
        Ok(self)
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate structural references and freeze into an [`Engine`].
    ///
    /// Checks that every configured input/output channel name, and every
    /// node's trigger/read/write channel name, resolves to a registered
    /// channel. Anything that doesn't is a `GraphValidationFailure` raised
    /// here, at build time, rather than discovered mid-run.
    pub fn build(self) -> EngineResult<Engine> {
        self.config.validate()?;

        for name in self.config.input_channels.iter().chain(self.config.output_channels.iter()) {
            if !self.channels.contains(name) {
                return Err(EngineError::GraphValidationFailure(format!(
                    "configured channel '{name}' is not registered"
                )));
            }
        }
        for node in self.nodes.iter() {
            for channel in node.input_channels() {
                if !self.channels.contains(&channel) {
                    return Err(EngineError::GraphValidationFailure(format!(
                        "node '{}' reads undeclared channel '{}'",
                        node.name, channel
                    )));
                }
            }
            for (channel, _) in &node.writes {
                if !self.channels.contains(channel) {
                    return Err(EngineError::GraphValidationFailure(format!(
                        "node '{}' writes undeclared channel '{}'",
                        node.name, channel
                    )));
                }
            }
        }

        Ok(Engine {
            channel_template: self.channels,
            nodes: Arc::new(self.nodes),
            config: self.config,
            checkpointer: None,
        })
    }
}

/// A compiled, immutable graph ready to be invoked. Construction (via
/// [`EngineBuilder`]) is where all structural validation happens; every
/// `invoke`-family call after that only deals with runtime failures.
pub struct Engine {
    pub(crate) channel_template: ChannelRegistry,
    pub(crate) nodes: Arc<NodeRegistry>,
    pub(crate) config: EngineConfig,
    pub(crate) checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Attach a checkpointer. Required before `checkpoint_enabled: true`
    /// configurations or `resume_from` calls do anything useful; without
    /// one, checkpointing is silently skipped and `resume_from` raises
    /// `ResumeNotConfigured`.
    pub fn set_checkpointer(&mut self, checkpointer: Arc<dyn Checkpointer>) {
        self.checkpointer = Some(checkpointer);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
