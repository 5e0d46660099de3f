//! Node registry: name → descriptor map plus an inverted index from channel
//! name to subscriber set, so the scheduler can go from "these channels are
//! dirty" to "these nodes should run" without scanning every node.

use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, EngineResult};
use crate::node::NodeDescriptor;

/// Owns every node descriptor for a graph. `register` maintains the
/// inverted index; lookups by channel name are O(1) plus the size of the
/// matched subscriber set.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, NodeDescriptor>,
    // Insertion order, kept separately from the HashMap so that scheduling
    // within a step is reproducible even though execution itself runs
    // concurrently.
    order: Vec<String>,
    channel_to_nodes: HashMap<String, HashSet<String>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node: NodeDescriptor) -> EngineResult<()> {
        if self.nodes.contains_key(&node.name) {
            return Err(EngineError::GraphValidationFailure(format!(
                "node '{}' is already registered",
                node.name
            )));
        }
        for channel in node.input_channels() {
            self.channel_to_nodes.entry(channel).or_default().insert(node.name.clone());
        }
        self.order.push(node.name.clone());
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<NodeDescriptor> {
        let node = self.nodes.remove(name)?;
        self.order.retain(|n| n != name);
        for channel in node.input_channels() {
            if let Some(subscribers) = self.channel_to_nodes.get_mut(&channel) {
                subscribers.remove(name);
            }
        }
        Some(node)
    }

    pub fn get(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes whose trigger set intersects `dirty`, in registry
    /// insertion order.
    pub fn nodes_subscribed_to_any(&self, dirty: &[String]) -> Vec<&NodeDescriptor> {
        let dirty_set: HashSet<&str> = dirty.iter().map(|s| s.as_str()).collect();
        let mut candidate_names: HashSet<&str> = HashSet::new();
        for name in &dirty_set {
            if let Some(subscribers) = self.channel_to_nodes.get(*name) {
                candidate_names.extend(subscribers.iter().map(|s| s.as_str()));
            }
        }
        self.order
            .iter()
            .filter_map(|name| self.nodes.get(name))
            .filter(|node| {
                candidate_names.contains(node.name.as_str())
                    && node.triggers.iter().any(|t| dirty_set.contains(t.as_str()))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.order.iter().filter_map(|name| self.nodes.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    fn node(name: &str, trigger: &str) -> NodeDescriptor {
        NodeBuilder::new(name)
            .trigger(trigger)
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build()
            .unwrap()
    }

    #[test]
    fn subscribed_nodes_found_via_inverted_index() {
        let mut registry = NodeRegistry::new();
        registry.register(node("a", "x")).unwrap();
        registry.register(node("b", "y")).unwrap();
        registry.register(node("c", "x")).unwrap();

        let subscribed = registry.nodes_subscribed_to_any(&["x".to_string()]);
        let names: HashSet<&str> = subscribed.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, HashSet::from(["a", "c"]));
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut registry = NodeRegistry::new();
        registry.register(node("b", "x")).unwrap();
        registry.register(node("a", "x")).unwrap();
        let order: Vec<&str> = registry.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = NodeRegistry::new();
        registry.register(node("a", "x")).unwrap();
        assert!(registry.register(node("a", "x")).is_err());
    }

    #[test]
    fn remove_cleans_up_inverted_index() {
        let mut registry = NodeRegistry::new();
        registry.register(node("a", "x")).unwrap();
        registry.remove("a");
        assert!(registry.nodes_subscribed_to_any(&["x".to_string()]).is_empty());
    }
}
