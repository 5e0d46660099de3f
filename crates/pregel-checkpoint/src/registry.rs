//! Channel registry: the name-addressable collection of live channels for one
//! execution, plus the derived per-step dirty set.

use std::collections::HashMap;

use serde_json::Value;

use crate::channel::{Channel, ChannelKind};
use crate::checkpoint::ChannelState;
use crate::error::{ChannelError, ChannelResult};

/// Owns every channel for one thread's execution. Exclusively responsible
/// for channel lifetime: channels are only ever produced by `register`/
/// `get_or_create` and consumed via `restore`.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Box<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new channel. Errors if a channel with this name already
    /// exists.
    pub fn register(&mut self, channel: Box<dyn Channel>) -> ChannelResult<()> {
        let name = channel.name().to_string();
        if self.channels.contains_key(&name) {
            return Err(ChannelError::InvalidUpdate {
                channel: name,
                reason: "a channel with this name is already registered".to_string(),
            });
        }
        self.channels.insert(name, channel);
        Ok(())
    }

    /// Fetch a channel's current value by name.
    pub fn get(&self, name: &str) -> ChannelResult<Value> {
        self.channels
            .get(name)
            .ok_or_else(|| ChannelError::EmptyChannel(name.to_string()))?
            .get()
    }

    /// Whether a channel with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ChannelKind> {
        self.channels.get(name).map(|c| c.kind())
    }

    /// Apply one step's worth of writes, grouped by channel. Each channel's
    /// `update` is invoked exactly once with the full batch destined for it.
    /// Returns the set of channel names whose `update` reported a change —
    /// this is the dirty set the scheduler reads for the next step.
    pub fn batch_update(
        &mut self,
        writes: HashMap<String, Vec<Value>>,
    ) -> ChannelResult<Vec<String>> {
        let mut changed = Vec::new();
        for (name, batch) in writes {
            let channel = self
                .channels
                .get_mut(&name)
                .ok_or_else(|| ChannelError::EmptyChannel(name.clone()))?;
            if channel.update(batch)? {
                changed.push(name);
            }
        }
        Ok(changed)
    }

    /// Channels whose dirty flag is currently set. Derived on demand from
    /// each channel's own flag rather than tracked independently, so there
    /// is exactly one source of truth for "did this change."
    pub fn dirty_channels(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|(_, c)| c.is_dirty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Clear every channel's dirty flag. Called by the driver at the start
    /// of each step (including before step 0, once inputs are seeded).
    pub fn clear_dirty(&mut self) {
        for channel in self.channels.values_mut() {
            channel.clear_dirty();
        }
    }

    /// Force a channel's dirty flag set without touching its value. Used by
    /// the driver to seed configured input channels at step 0 even when the
    /// caller's input is null.
    pub fn force_dirty(&mut self, name: &str) {
        if let Some(channel) = self.channels.get_mut(name) {
            channel.mark_dirty();
        }
    }

    /// Run `Channel::consume` on an ephemeral channel by name, if present.
    pub fn consume(&mut self, name: &str) -> bool {
        self.channels.get_mut(name).map(|c| c.consume()).unwrap_or(false)
    }

    /// Snapshot every checkpointable channel's current state. Ephemeral
    /// channels (and any other channel that reports `NotCheckpointable`) are
    /// silently omitted, matching the checkpoint protocol's "ephemeral
    /// channels are omitted" rule.
    pub fn snapshot(&self) -> HashMap<String, ChannelState> {
        self.channels
            .iter()
            .filter_map(|(name, channel)| {
                channel.checkpoint().ok().map(|value| {
                    (name.clone(), ChannelState { kind: channel.kind(), value })
                })
            })
            .collect()
    }

    /// Restore each registered channel present in `states` from its
    /// persisted value. Channels in the registry but absent from `states`
    /// are left untouched, per the checkpoint protocol's resume rule.
    pub fn restore(&mut self, states: &HashMap<String, ChannelState>) -> ChannelResult<()> {
        for (name, state) in states {
            if let Some(channel) = self.channels.get_mut(name) {
                channel.from_checkpoint(state.value.clone())?;
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Channel>> {
        self.channels.remove(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(|s| s.as_str())
    }

    /// Independent copy of every channel, via [`Channel::copy`]. Used by the
    /// execution engine to turn a graph-template registry into a fresh,
    /// per-invocation one without re-registering every channel by hand.
    pub fn copy(&self) -> ChannelRegistry {
        ChannelRegistry {
            channels: self.channels.iter().map(|(name, channel)| (name.clone(), channel.copy())).collect(),
        }
    }
}
