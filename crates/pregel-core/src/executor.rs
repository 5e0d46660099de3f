//! Parallel executor (C7): fans out one step's planned nodes onto a bounded
//! worker pool, applies retry/timeout per node, and collects per-channel
//! writes once each node returns.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pregel_checkpoint::ChannelRegistry;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::context::ExecutionContext;
use crate::error::{EngineError, EngineResult};
use crate::input::assemble_input;
use crate::node::{NodeDescriptor, Processor};

/// Outcome of one node's invocation this step, after retry/timeout handling
/// and write-projection have both run.
#[derive(Debug)]
pub enum NodeOutcome {
    Success {
        node: String,
        output: Value,
        /// Channel writes surviving projection, in write-target order.
        /// A projection that returned `Value::Null` (conditional write) or
        /// that panicked is simply absent here.
        writes: Vec<(String, Value)>,
        duration: Duration,
    },
    Failure {
        node: String,
        error: EngineError,
        duration: Duration,
    },
}

impl NodeOutcome {
    pub fn node_name(&self) -> &str {
        match self {
            NodeOutcome::Success { node, .. } => node,
            NodeOutcome::Failure { node, .. } => node,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, NodeOutcome::Failure { .. })
    }
}

/// Fixed-size concurrency cap for one step's node batch. Node invocations
/// themselves run as `tokio::spawn`ed tasks (so a panicking node cannot take
/// the driver down with it); the semaphore just bounds how many run at once.
pub struct ParallelExecutor {
    pool_size: usize,
}

impl ParallelExecutor {
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size: pool_size.max(1) }
    }

    /// Run every planned node concurrently and wait for all of them — the
    /// BSP barrier. Channel writes are *not* applied here; the caller
    /// (the driver, via the update service) does that once every outcome is
    /// in hand.
    pub async fn execute_step(
        &self,
        planned: &[NodeDescriptor],
        registry: &ChannelRegistry,
        ctx: &ExecutionContext,
    ) -> Vec<NodeOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut handles = Vec::with_capacity(planned.len());

        for node in planned {
            let node = node.clone();
            let input = assemble_input(&node, registry);
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit =
                    semaphore.acquire_owned().await.expect("executor semaphore is never closed");
                run_node_with_retry(&node, input, &ctx).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (node, handle) in planned.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => NodeOutcome::Failure {
                    node: node.name.clone(),
                    error: EngineError::node_failure(
                        node.name.clone(),
                        format!("node task panicked: {join_err}"),
                    ),
                    duration: Duration::default(),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// One node's full lifecycle for this step: attempt, retry per policy on
/// retryable failure, then project writes once an attempt succeeds.
///
/// `max_attempts` counts *retries*, not total attempts: `max_attempts == 0`
/// disables retry entirely and the node runs exactly once.
async fn run_node_with_retry(node: &NodeDescriptor, input: Value, ctx: &ExecutionContext) -> NodeOutcome {
    let start = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match run_single_attempt(node, input.clone(), ctx).await {
            Ok(output) => {
                let writes = apply_projections(node, &output);
                return NodeOutcome::Success {
                    node: node.name.clone(),
                    output,
                    writes,
                    duration: start.elapsed(),
                };
            }
            Err(err) => {
                let attempts_left = attempt <= node.retry_policy.max_attempts;
                let retryable = node.retry_policy.is_retryable(&err);
                if !attempts_left || !retryable {
                    tracing::warn!(node = %node.name, attempt, error = %err, "node failed, not retrying");
                    return NodeOutcome::Failure { node: node.name.clone(), error: err, duration: start.elapsed() };
                }
                let delay = node.retry_policy.delay_for_attempt(attempt);
                tracing::debug!(node = %node.name, attempt, ?delay, error = %err, "node attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// One attempt: dispatch to the right processor variant, applying the
/// node's per-attempt timeout if configured. A fired timeout counts as one
/// attempt for retry purposes — it is just another `Err` from this
/// function's point of view.
async fn run_single_attempt(node: &NodeDescriptor, input: Value, ctx: &ExecutionContext) -> EngineResult<Value> {
    let fut = match &node.processor {
        Processor::Plain(f) => f(input),
        Processor::ContextAware(f) => f(input, ctx.clone()),
    };
    match node.timeout {
        Some(bound) => match tokio::time::timeout(bound, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::attempt_timeout(node.name.clone(), bound)),
        },
        None => fut.await,
    }
}

/// Apply every write-target projection to a node's output. A projection
/// returning `Value::Null` is a conditional "skip this channel." A
/// panicking projection is caught and logged as a dropped write for that
/// one channel — it does not abort the node's other writes.
fn apply_projections(node: &NodeDescriptor, output: &Value) -> Vec<(String, Value)> {
    let mut writes = Vec::with_capacity(node.writes.len());
    for (channel, projection) in &node.writes {
        let projected = match projection {
            Some(p) => match std::panic::catch_unwind(AssertUnwindSafe(|| p(output))) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(node = %node.name, channel, "projection panicked, dropping this write");
                    continue;
                }
            },
            None => output.clone(),
        };
        if !projected.is_null() {
            writes.push((channel.clone(), projected));
        }
    }
    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineConfig;
    use crate::node::{BackoffStrategy, NodeBuilder, RetryPolicy};
    use pregel_checkpoint::{Channel, LastValueChannel};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("t", EngineConfig::default(), HashMap::new())
    }

    fn registry_with_input(value: Value) -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        registry.register(Box::new(LastValueChannel::new("input"))).unwrap();
        let mut writes = HashMap::new();
        writes.insert("input".to_string(), vec![value]);
        registry.batch_update(writes).unwrap();
        registry
    }

    #[tokio::test]
    async fn successful_node_produces_projected_writes() {
        let registry = registry_with_input(Value::from("hello"));
        let node = NodeBuilder::new("upper")
            .trigger("input")
            .write("output")
            .processor(|v| {
                Box::pin(async move { Ok(Value::from(v.as_str().unwrap().to_uppercase())) })
            })
            .build()
            .unwrap();

        let executor = ParallelExecutor::new(2);
        let outcomes = executor.execute_step(&[node], &registry, &ctx()).await;
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            NodeOutcome::Success { writes, output, .. } => {
                assert_eq!(output, &Value::from("HELLO"));
                assert_eq!(writes, &vec![("output".to_string(), Value::from("HELLO"))]);
            }
            NodeOutcome::Failure { .. } => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn conditional_write_projection_returning_null_is_skipped() {
        let registry = registry_with_input(Value::from(16));
        let node = NodeBuilder::new("grow")
            .trigger("input")
            .write_with_projection(
                "input",
                Arc::new(|v: &Value| {
                    let n = v.as_i64().unwrap();
                    if n < 10 { Value::from(n * 2) } else { Value::Null }
                }),
            )
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build()
            .unwrap();

        let executor = ParallelExecutor::new(1);
        let outcomes = executor.execute_step(&[node], &registry, &ctx()).await;
        match &outcomes[0] {
            NodeOutcome::Success { writes, .. } => assert!(writes.is_empty()),
            NodeOutcome::Failure { .. } => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn retry_exhaustion_surfaces_as_failure() {
        let registry = registry_with_input(Value::Null);
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let node = NodeBuilder::new("flaky")
            .trigger("input")
            .retry_policy(RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                strategy: BackoffStrategy::Fixed,
                retryable: None,
            })
            .processor(move |_v| {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(EngineError::node_failure("flaky", "boom"))
                })
            })
            .build()
            .unwrap();

        let executor = ParallelExecutor::new(1);
        let outcomes = executor.execute_step(&[node], &registry, &ctx()).await;
        assert!(outcomes[0].is_failure());
        // 1 initial attempt + 2 retries = 3 total attempts.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempt_timeout_fires_and_counts_as_an_attempt() {
        let registry = registry_with_input(Value::Null);
        let node = NodeBuilder::new("slow")
            .trigger("input")
            .timeout(Duration::from_millis(5))
            .processor(|_v| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(Value::Null)
                })
            })
            .build()
            .unwrap();

        let executor = ParallelExecutor::new(1);
        let outcomes = executor.execute_step(&[node], &registry, &ctx()).await;
        match &outcomes[0] {
            NodeOutcome::Failure { error, .. } => {
                assert!(matches!(error, EngineError::AttemptTimeout { .. }));
            }
            NodeOutcome::Success { .. } => panic!("expected timeout failure"),
        }
    }

    #[tokio::test]
    async fn peer_failure_does_not_abort_other_nodes_in_the_step() {
        let registry = registry_with_input(Value::from(1));
        let ok_node = NodeBuilder::new("ok")
            .trigger("input")
            .write("ra")
            .processor(|v| Box::pin(async move { Ok(v) }))
            .build()
            .unwrap();
        let bad_node = NodeBuilder::new("bad")
            .trigger("input")
            .processor(|_v| Box::pin(async move { Err(EngineError::node_failure("bad", "nope")) }))
            .build()
            .unwrap();

        let executor = ParallelExecutor::new(2);
        let outcomes = executor.execute_step(&[ok_node, bad_node], &registry, &ctx()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().any(|o| matches!(o, NodeOutcome::Success { .. })));
        assert!(outcomes.iter().any(|o| o.is_failure()));
    }
}
