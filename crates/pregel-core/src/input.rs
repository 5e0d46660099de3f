//! Input assembler (C5): builds one node's call argument from the channels
//! it is allowed to read.

use pregel_checkpoint::ChannelRegistry;
use serde_json::Value;

use crate::node::NodeDescriptor;

/// Assemble the input value a node sees this step.
///
/// Fast path: a node with exactly one trigger and no extra reads gets that
/// channel's raw value (or `Value::Null` if the channel is empty) — no
/// allocation, no map. Every other node gets a named map covering the union
/// of its trigger and read sets, with `Value::Null` standing in for any
/// channel that has never been written.
pub fn assemble_input(node: &NodeDescriptor, registry: &ChannelRegistry) -> Value {
    if node.triggers.len() == 1 && node.reads.is_empty() {
        let name = node.triggers.iter().next().expect("builder enforces a non-empty trigger set");
        return registry.get(name).unwrap_or(Value::Null);
    }

    let mut map = serde_json::Map::new();
    for channel in node.input_channels() {
        let value = registry.get(&channel).unwrap_or(Value::Null);
        map.insert(channel, value);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregel_checkpoint::{Channel, LastValueChannel};

    fn registry_with(pairs: &[(&str, Value)]) -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        for (name, _) in pairs {
            registry.register(Box::new(LastValueChannel::new(*name))).unwrap();
        }
        for (name, value) in pairs {
            if !value.is_null() {
                let mut writes = std::collections::HashMap::new();
                writes.insert(name.to_string(), vec![value.clone()]);
                registry.batch_update(writes).unwrap();
            }
        }
        registry
    }

    #[test]
    fn single_trigger_no_reads_uses_fast_path() {
        let registry = registry_with(&[("input", Value::from("hello"))]);
        let node = crate::node::NodeBuilder::new("n")
            .trigger("input")
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build()
            .unwrap();
        assert_eq!(assemble_input(&node, &registry), Value::from("hello"));
    }

    #[test]
    fn single_trigger_empty_channel_yields_null() {
        let mut registry = ChannelRegistry::new();
        registry.register(Box::new(LastValueChannel::new("input"))).unwrap();
        let node = crate::node::NodeBuilder::new("n")
            .trigger("input")
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build()
            .unwrap();
        assert_eq!(assemble_input(&node, &registry), Value::Null);
    }

    #[test]
    fn multi_channel_node_gets_named_map() {
        let registry = registry_with(&[("ra", Value::from("A")), ("rb", Value::from("B"))]);
        let node = crate::node::NodeBuilder::new("merge")
            .trigger("ra")
            .read("rb")
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build()
            .unwrap();
        let input = assemble_input(&node, &registry);
        assert_eq!(input.get("ra"), Some(&Value::from("A")));
        assert_eq!(input.get("rb"), Some(&Value::from("B")));
    }

    #[test]
    fn two_triggers_with_no_reads_still_uses_map_form() {
        let registry = registry_with(&[("a", Value::from(1)), ("b", Value::from(2))]);
        let node = crate::node::NodeBuilder::new("n")
            .trigger("a")
            .trigger("b")
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build()
            .unwrap();
        assert!(assemble_input(&node, &registry).is_object());
    }
}
