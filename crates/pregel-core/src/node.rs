//! Node descriptor: the unit of work the scheduler triggers and the executor
//! runs.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{EngineError, EngineResult};

/// A plain node body: input in, output out, no access to execution state.
pub type PlainFuture = Pin<Box<dyn Future<Output = EngineResult<Value>> + Send>>;
/// A context-aware node body: also receives a read-only view of the current
/// execution context (step number, thread id, tags).
pub type ContextFuture = Pin<Box<dyn Future<Output = EngineResult<Value>> + Send>>;

/// The callable a node descriptor wraps. Both variants are `Fn`, not
/// `FnMut`/`FnOnce`: a node may be invoked many times (once per step it is
/// triggered) and possibly concurrently with other nodes in the same step.
#[derive(Clone)]
pub enum Processor {
    Plain(Arc<dyn Fn(Value) -> PlainFuture + Send + Sync>),
    ContextAware(Arc<dyn Fn(Value, ExecutionContext) -> ContextFuture + Send + Sync>),
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Processor::Plain(_) => write!(f, "Processor::Plain"),
            Processor::ContextAware(_) => write!(f, "Processor::ContextAware"),
        }
    }
}

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// `initial * attempt`.
    Linear,
    /// `initial * 2^(attempt - 1)`.
    Exponential,
}

/// Retry policy for one node. `max_attempts == 0` disables retry: the node
/// runs exactly once.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub strategy: BackoffStrategy,
    /// Predicate selecting which errors are retryable. `None` means "retry
    /// every error" (the default).
    pub retryable: Option<Arc<dyn Fn(&EngineError) -> bool + Send + Sync>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::from_millis(100),
            strategy: BackoffStrategy::Exponential,
            retryable: None,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, initial_backoff: delay, strategy: BackoffStrategy::Fixed, retryable: None }
    }

    pub fn linear(max_attempts: u32, initial: Duration) -> Self {
        Self { max_attempts, initial_backoff: initial, strategy: BackoffStrategy::Linear, retryable: None }
    }

    pub fn exponential(max_attempts: u32, initial: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: initial,
            strategy: BackoffStrategy::Exponential,
            retryable: None,
        }
    }

    /// Delay before the given 1-indexed attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.initial_backoff,
            BackoffStrategy::Linear => self.initial_backoff * attempt.max(1),
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.initial_backoff * factor
            }
        }
    }

    pub fn is_retryable(&self, err: &EngineError) -> bool {
        match &self.retryable {
            Some(pred) => pred(err),
            None => true,
        }
    }
}

/// A projection applied to a node's raw output before it is written to one
/// of its write-target channels. Returning `Value::Null` means "write
/// nothing to this channel this step" (a conditional write).
pub type Projection = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Immutable description of one node: what triggers it, what it reads, what
/// it writes, and how retries/timeouts are handled. Constructed via
/// [`NodeBuilder`] and installed into a [`crate::node_registry::NodeRegistry`].
#[derive(Clone)]
pub struct NodeDescriptor {
    pub name: String,
    pub triggers: HashSet<String>,
    pub reads: HashSet<String>,
    pub writes: Vec<(String, Option<Projection>)>,
    pub processor: Processor,
    pub retry_policy: RetryPolicy,
    pub timeout: Option<Duration>,
    pub description: Option<String>,
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("name", &self.name)
            .field("triggers", &self.triggers)
            .field("reads", &self.reads)
            .field("write_channels", &self.writes.iter().map(|(c, _)| c).collect::<Vec<_>>())
            .field("retry_policy", &self.retry_policy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NodeDescriptor {
    pub fn builder(name: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(name)
    }

    /// Full set of channels this node's input is assembled from: triggers
    /// plus extra reads.
    pub fn input_channels(&self) -> HashSet<String> {
        self.triggers.union(&self.reads).cloned().collect()
    }
}

/// Builder for [`NodeDescriptor`]. Validates the invariants the descriptor
/// itself assumes hold: a non-empty trigger set and exactly one processor.
pub struct NodeBuilder {
    name: String,
    triggers: HashSet<String>,
    reads: HashSet<String>,
    writes: Vec<(String, Option<Projection>)>,
    processor: Option<Processor>,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
    description: Option<String>,
}

impl NodeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggers: HashSet::new(),
            reads: HashSet::new(),
            writes: Vec::new(),
            processor: None,
            retry_policy: RetryPolicy::default(),
            timeout: None,
            description: None,
        }
    }

    pub fn trigger(mut self, channel: impl Into<String>) -> Self {
        self.triggers.insert(channel.into());
        self
    }

    pub fn triggers(mut self, channels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.triggers.extend(channels.into_iter().map(Into::into));
        self
    }

    pub fn read(mut self, channel: impl Into<String>) -> Self {
        self.reads.insert(channel.into());
        self
    }

    pub fn write(mut self, channel: impl Into<String>) -> Self {
        self.writes.push((channel.into(), None));
        self
    }

    pub fn write_with_projection(
        mut self,
        channel: impl Into<String>,
        projection: Projection,
    ) -> Self {
        self.writes.push((channel.into(), Some(projection)));
        self
    }

    pub fn processor(
        mut self,
        f: impl Fn(Value) -> PlainFuture + Send + Sync + 'static,
    ) -> Self {
        self.processor = Some(Processor::Plain(Arc::new(f)));
        self
    }

    pub fn context_aware_processor(
        mut self,
        f: impl Fn(Value, ExecutionContext) -> ContextFuture + Send + Sync + 'static,
    ) -> Self {
        self.processor = Some(Processor::ContextAware(Arc::new(f)));
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(self) -> EngineResult<NodeDescriptor> {
        if self.triggers.is_empty() {
            return Err(EngineError::GraphValidationFailure(format!(
                "node '{}' has an empty trigger set",
                self.name
            )));
        }
        let processor = self.processor.ok_or_else(|| {
            EngineError::GraphValidationFailure(format!(
                "node '{}' has no processor configured",
                self.name
            ))
        })?;
        Ok(NodeDescriptor {
            name: self.name,
            triggers: self.triggers,
            reads: self.reads,
            writes: self.writes,
            processor,
            retry_policy: self.retry_policy,
            timeout: self.timeout,
            description: self.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trigger_set_rejected() {
        let result = NodeBuilder::new("n")
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn missing_processor_rejected() {
        let result = NodeBuilder::new("n").trigger("a").build();
        assert!(result.is_err());
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(40));
    }

    #[test]
    fn linear_backoff_scales_by_attempt() {
        let policy = RetryPolicy::linear(5, Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(30));
    }
}
