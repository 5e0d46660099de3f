//! Scheduler / planner (C6): turns a dirty set into the list of nodes
//! eligible to run this step.
//!
//! This is deliberately thin — [`crate::node_registry::NodeRegistry`] already
//! maintains the channel → subscriber inverted index the planner needs, so
//! planning is just a named entry point onto that lookup rather than a
//! second index.
use crate::node::NodeDescriptor;
use crate::node_registry::NodeRegistry;

/// Nodes to execute in the next step, in registry-insertion order. A node
/// whose trigger set does not intersect `dirty` is skipped — this is the
/// only mechanism that brings a BSP loop to a fixed point.
pub fn plan<'a>(nodes: &'a NodeRegistry, dirty: &[String]) -> Vec<&'a NodeDescriptor> {
    nodes.nodes_subscribed_to_any(dirty)
}
