//! Update service (C8): groups one step's successful node writes by channel
//! and applies them as a single registry batch update.

use std::collections::HashMap;

use pregel_checkpoint::ChannelRegistry;
use serde_json::Value;

use crate::error::EngineResult;
use crate::executor::NodeOutcome;

/// Group every successful outcome's writes by target channel and hand the
/// batch to the registry. Failed nodes contribute no writes — their
/// channels are simply absent from this step's batch, not written with a
/// null. Returns the new dirty set (channels whose `update` reported a
/// change), exactly what the registry reports from `batch_update`.
pub fn apply_updates(registry: &mut ChannelRegistry, outcomes: &[NodeOutcome]) -> EngineResult<Vec<String>> {
    let mut writes: HashMap<String, Vec<Value>> = HashMap::new();
    for outcome in outcomes {
        if let NodeOutcome::Success { writes: node_writes, .. } = outcome {
            for (channel, value) in node_writes {
                writes.entry(channel.clone()).or_default().push(value.clone());
            }
        }
    }
    Ok(registry.batch_update(writes)?)
}
