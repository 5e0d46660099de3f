//! Channel kinds: the four value-merge disciplines a BSP step can write through.
//!
//! A channel is a named, addressable state cell. It accepts a *batch* of
//! values once per step (possibly from several concurrently executing nodes)
//! and folds that batch into its current value according to its kind's merge
//! rule. Values are represented as [`serde_json::Value`] rather than a
//! generic type parameter: the registry (`ChannelRegistry`) holds a
//! heterogeneous map of channels with different kinds and this is the
//! type-erasure boundary the rest of the engine is built on (see the crate's
//! design notes on type erasure).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, ChannelResult};

/// Tag identifying which merge discipline a channel implements. Stored
/// alongside a channel's checkpoint value so a restored channel can be
/// reconstructed without knowing its concrete Rust type ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    LastValue,
    Topic,
    BinaryReduce,
    Ephemeral,
}

/// The contract every channel kind implements.
///
/// Implementations are plain owned structs (not `Arc`/`Mutex` wrapped) —
/// synchronization across concurrent writers is the registry's job (it
/// serializes all mutation through `&mut self` behind its own lock), not the
/// channel's.
pub trait Channel: Send + Sync + fmt::Debug {
    /// Stable name this channel was registered under.
    fn name(&self) -> &str;

    /// Which merge discipline this is. Used by the checkpoint layer to tag
    /// persisted state without downcasting.
    fn kind(&self) -> ChannelKind;

    /// Current value. `EmptyChannel` if nothing has been written yet (or, for
    /// `Ephemeral`, if the value has already been consumed).
    fn get(&self) -> ChannelResult<Value>;

    /// Apply one step's batch of writes. Returns `true` if the observable
    /// value changed (sets the dirty flag), `false` otherwise (e.g. an
    /// all-null batch).
    ///
    /// `Err(InvalidUpdate)` if the batch violates the kind's legality rule;
    /// the channel's state is left unchanged in that case.
    fn update(&mut self, values: Vec<Value>) -> ChannelResult<bool>;

    /// Whether `update`/`consume` has set the dirty flag since the last
    /// `clear_dirty`.
    fn is_dirty(&self) -> bool;

    /// Clear the dirty flag. Called by the registry at the start of every
    /// step, never by channel consumers directly.
    fn clear_dirty(&mut self);

    /// Force the dirty flag set without touching the value. Used only to
    /// seed a graph's configured input channels at step 0, where a null
    /// input must still trigger the first planning phase.
    fn mark_dirty(&mut self) {}

    /// Consume-once side effect for `Ephemeral` channels. Returns `true` if a
    /// value was actually cleared. No-op (returns `false`) for the other
    /// three kinds.
    fn consume(&mut self) -> bool {
        false
    }

    /// Project current state to a persistable value. `Err(NotCheckpointable)`
    /// for `Ephemeral`.
    fn checkpoint(&self) -> ChannelResult<Value>;

    /// Replace this channel's state with a previously checkpointed value.
    /// Resets the dirty flag to `false`.
    fn from_checkpoint(&mut self, value: Value) -> ChannelResult<()>;

    /// Independent copy with identical semantic state, including the dirty
    /// flag. Used by the registry when it needs to hand out a snapshot that
    /// downstream code may mutate without affecting the live channel.
    fn copy(&self) -> Box<dyn Channel>;
}

/// Holds at most one value per step; at most one non-null write is legal.
#[derive(Debug, Clone)]
pub struct LastValueChannel {
    name: String,
    value: Option<Value>,
    dirty: bool,
}

impl LastValueChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None, dirty: false }
    }
}

impl Channel for LastValueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::LastValue
    }

    fn get(&self) -> ChannelResult<Value> {
        self.value.clone().ok_or_else(|| ChannelError::EmptyChannel(self.name.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> ChannelResult<bool> {
        let non_null: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        if non_null.len() > 1 {
            return Err(ChannelError::InvalidUpdate {
                channel: self.name.clone(),
                reason: format!(
                    "at most one value may be written per step, got {}",
                    non_null.len()
                ),
            });
        }
        match non_null.into_iter().next() {
            Some(v) => {
                self.value = Some(v);
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn checkpoint(&self) -> ChannelResult<Value> {
        Ok(self.value.clone().unwrap_or(Value::Null))
    }

    fn from_checkpoint(&mut self, value: Value) -> ChannelResult<()> {
        self.value = if value.is_null() { None } else { Some(value) };
        self.dirty = false;
        Ok(())
    }

    fn copy(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Accumulates an ordered list of values across the graph's lifetime (or,
/// when `accumulate` is false, just across the current step).
#[derive(Debug, Clone)]
pub struct TopicChannel {
    name: String,
    values: Vec<Value>,
    accumulate: bool,
    unique: bool,
    dirty: bool,
}

impl TopicChannel {
    pub fn new(name: impl Into<String>, accumulate: bool, unique: bool) -> Self {
        Self { name: name.into(), values: Vec::new(), accumulate, unique, dirty: false }
    }
}

impl Channel for TopicChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Topic
    }

    fn get(&self) -> ChannelResult<Value> {
        Ok(Value::Array(self.values.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> ChannelResult<bool> {
        let incoming: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        if incoming.is_empty() && self.accumulate {
            return Ok(false);
        }
        let before = self.values.clone();
        if !self.accumulate {
            self.values.clear();
        }
        for v in incoming {
            if self.unique && self.values.contains(&v) {
                continue;
            }
            self.values.push(v);
        }
        let changed = self.values != before;
        if changed {
            self.dirty = true;
        }
        Ok(changed)
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn checkpoint(&self) -> ChannelResult<Value> {
        Ok(Value::Array(self.values.clone()))
    }

    fn from_checkpoint(&mut self, value: Value) -> ChannelResult<()> {
        self.values = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        self.dirty = false;
        Ok(())
    }

    fn copy(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Binary associative fold over a batch, e.g. a running sum or a
/// concatenation. `op` is stored behind an `Arc` (not a `Box`) specifically
/// so the channel can be cheaply and correctly `Clone`d — a prior revision of
/// this type boxed the closure and had to panic out of `copy()`.
#[derive(Clone)]
pub struct BinaryReduceChannel {
    name: String,
    op: Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>,
    op_label: &'static str,
    identity: Option<Value>,
    value: Option<Value>,
    dirty: bool,
}

impl fmt::Debug for BinaryReduceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryReduceChannel")
            .field("name", &self.name)
            .field("op", &self.op_label)
            .field("identity", &self.identity)
            .field("value", &self.value)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl BinaryReduceChannel {
    pub fn new(
        name: impl Into<String>,
        op_label: &'static str,
        op: Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>,
        identity: Option<Value>,
    ) -> Self {
        Self { name: name.into(), op, op_label, identity, value: None, dirty: false }
    }

    /// Sums numeric values. Non-numeric operands are treated as 0.
    pub fn sum(name: impl Into<String>) -> Self {
        Self::new(
            name,
            "sum",
            Arc::new(|a, b| {
                let a = a.as_f64().unwrap_or(0.0);
                let b = b.as_f64().unwrap_or(0.0);
                serde_json::json!(a + b)
            }),
            Some(Value::from(0)),
        )
    }

    /// Appends each write to a growing array (unlike `Topic`, this collapses
    /// to a single running value rather than a list channel).
    pub fn append(name: impl Into<String>) -> Self {
        Self::new(
            name,
            "append",
            Arc::new(|a, b| {
                let mut items = match a {
                    Value::Array(items) => items.clone(),
                    Value::Null => Vec::new(),
                    other => vec![other.clone()],
                };
                items.push(b.clone());
                Value::Array(items)
            }),
            Some(Value::Array(Vec::new())),
        )
    }
}

impl Channel for BinaryReduceChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::BinaryReduce
    }

    fn get(&self) -> ChannelResult<Value> {
        self.value.clone().ok_or_else(|| ChannelError::EmptyChannel(self.name.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> ChannelResult<bool> {
        let incoming: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        if incoming.is_empty() {
            return Ok(false);
        }
        for v in incoming {
            self.value = Some(match self.value.take() {
                Some(current) => (self.op)(&current, &v),
                None => v,
            });
        }
        self.dirty = true;
        Ok(true)
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn checkpoint(&self) -> ChannelResult<Value> {
        match &self.value {
            Some(v) => Ok(v.clone()),
            None => self
                .identity
                .clone()
                .ok_or_else(|| ChannelError::NotCheckpointable(self.name.clone())),
        }
    }

    fn from_checkpoint(&mut self, value: Value) -> ChannelResult<()> {
        self.value = if value.is_null() { None } else { Some(value) };
        self.dirty = false;
        Ok(())
    }

    fn copy(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Single value consumable exactly once. Never checkpointable.
#[derive(Debug, Clone)]
pub struct EphemeralChannel {
    name: String,
    value: Option<Value>,
    consumed: bool,
    dirty: bool,
}

impl EphemeralChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None, consumed: false, dirty: false }
    }
}

impl Channel for EphemeralChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Ephemeral
    }

    fn get(&self) -> ChannelResult<Value> {
        if self.consumed {
            return Err(ChannelError::EmptyChannel(self.name.clone()));
        }
        self.value.clone().ok_or_else(|| ChannelError::EmptyChannel(self.name.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> ChannelResult<bool> {
        let non_null: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        if non_null.len() > 1 {
            return Err(ChannelError::InvalidUpdate {
                channel: self.name.clone(),
                reason: format!(
                    "at most one value may be written per step, got {}",
                    non_null.len()
                ),
            });
        }
        match non_null.into_iter().next() {
            Some(v) => {
                self.value = Some(v);
                self.consumed = false;
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn consume(&mut self) -> bool {
        if self.value.is_some() && !self.consumed {
            self.value = None;
            self.consumed = true;
            true
        } else {
            false
        }
    }

    fn checkpoint(&self) -> ChannelResult<Value> {
        Err(ChannelError::NotCheckpointable(self.name.clone()))
    }

    fn from_checkpoint(&mut self, _value: Value) -> ChannelResult<()> {
        Err(ChannelError::NotCheckpointable(self.name.clone()))
    }

    fn copy(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}
