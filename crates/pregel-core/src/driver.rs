//! BSP driver (C9): the Plan → Execute → Update → Checkpoint state machine
//! that turns a compiled [`crate::graph::Engine`] into a running invocation.
//!
//! This module only contains the step machinery shared by every invocation
//! surface; the public entry points themselves (`invoke`, `stream`,
//! `stream_reactive`, ...) live in [`crate::surface`] as `impl Engine`
//! blocks, so that the step loop can be exercised independently of how a
//! caller chooses to consume it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use pregel_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, Checkpointer, ChannelRegistry};
use serde_json::Value;

use crate::context::{EngineConfig, ExecutionContext, ExecutionFailure, ExecutionStep};
use crate::error::EngineError;
use crate::executor::{NodeOutcome, ParallelExecutor};
use crate::node_registry::NodeRegistry;
use crate::scheduler;
use crate::update::apply_updates;

/// Write the caller's input into every configured input channel (skipped
/// entirely when the input is null, per each channel's own null-write
/// semantics) and then force every configured input channel dirty
/// regardless, so a null input still drives the first planning phase.
pub(crate) fn seed(channels: &mut ChannelRegistry, config: &EngineConfig, input: &Value) -> Result<(), EngineError> {
    if !input.is_null() && !config.input_channels.is_empty() {
        let mut writes = HashMap::new();
        for name in &config.input_channels {
            writes.insert(name.clone(), vec![input.clone()]);
        }
        channels.batch_update(writes)?;
    }
    for name in &config.input_channels {
        channels.force_dirty(name);
    }
    Ok(())
}

/// What happened when [`step_once`] ran the next planned batch of nodes.
pub(crate) enum StepOutcome {
    /// Nothing was planned — the dirty set is empty, execution is done.
    Completed,
    /// A node failed, or the Update phase rejected a batch of writes. When
    /// the nodes themselves ran and it was the Update phase that rejected
    /// their writes, the step they executed is still attached here — the
    /// barrier happened, so the step counts (see §8 scenario S5: two nodes
    /// executed, one step recorded, even though that step's update failed).
    /// A failure caught before the barrier (a node itself erroring) carries
    /// no step, since there is nothing to show for a batch that never got to
    /// Update.
    Failed(EngineError, Option<ExecutionStep>),
    /// One step ran to completion; here is its record.
    Advanced(ExecutionStep),
}

/// Run exactly one BSP step: capture the current dirty set, plan against it,
/// execute the plan under the barrier, fold writes back through the update
/// service, and (if configured) persist a checkpoint. Advances
/// `ctx`'s step counter on success.
pub(crate) async fn step_once(
    channels: &mut ChannelRegistry,
    nodes: &NodeRegistry,
    executor: &ParallelExecutor,
    ctx: &ExecutionContext,
    checkpointer: Option<&Arc<dyn Checkpointer>>,
    executed_nodes_total: &mut Vec<String>,
) -> StepOutcome {
    let dirty = channels.dirty_channels();
    channels.clear_dirty();

    let planned: Vec<_> = scheduler::plan(nodes, &dirty).into_iter().cloned().collect();
    if planned.is_empty() {
        return StepOutcome::Completed;
    }

    let span = tracing::info_span!("step", step = ctx.current_step(), planned = planned.len());
    let _entered = span.enter();
    let started_at = Instant::now();

    let mut outcomes = executor.execute_step(&planned, channels, ctx).await;
    if let Some(index) = outcomes.iter().position(NodeOutcome::is_failure) {
        let failure = outcomes.swap_remove(index);
        if let NodeOutcome::Failure { node, error, .. } = failure {
            tracing::warn!(%node, %error, "step failed, no further steps will run");
            return StepOutcome::Failed(error, None);
        }
        unreachable!("swap_remove returned the index just located by is_failure");
    }

    let executed: Vec<String> = planned.iter().map(|n| n.name.clone()).collect();

    let channel_snapshot = if ctx.config.debug {
        let snapshot: HashMap<String, Value> =
            channels.names().map(|name| (name.to_string(), channels.get(name).unwrap_or(Value::Null))).collect();
        Some(snapshot)
    } else {
        None
    };

    // The barrier has already happened — every planned node ran — so even if
    // the Update phase rejects the resulting batch, this step is recorded as
    // having executed these nodes, just with no dirty channels to show for
    // it (see `StepOutcome::Failed`'s doc comment).
    let dirty_after = match apply_updates(channels, &outcomes) {
        Ok(dirty) => dirty,
        Err(error) => {
            let step = ExecutionStep {
                step_number: ctx.current_step(),
                executed_nodes: executed,
                dirty_channels: Vec::new(),
                channel_snapshot,
                started_at,
                duration: started_at.elapsed(),
            };
            return StepOutcome::Failed(error, Some(step));
        }
    };

    for name in &executed {
        if !executed_nodes_total.contains(name) {
            executed_nodes_total.push(name.clone());
        }
    }

    let step = ExecutionStep {
        step_number: ctx.current_step(),
        executed_nodes: executed,
        dirty_channels: dirty_after,
        channel_snapshot,
        started_at,
        duration: started_at.elapsed(),
    };

    checkpoint_after_step(channels, ctx, checkpointer, &step, executed_nodes_total).await;

    ctx.set_current_step(ctx.current_step() + 1);
    StepOutcome::Advanced(step)
}

async fn checkpoint_after_step(
    channels: &ChannelRegistry,
    ctx: &ExecutionContext,
    checkpointer: Option<&Arc<dyn Checkpointer>>,
    step: &ExecutionStep,
    executed_nodes_total: &[String],
) {
    if !ctx.config.checkpoint_enabled {
        return;
    }
    let Some(checkpointer) = checkpointer else { return };

    let checkpoint = Checkpoint::new(
        ctx.thread_id.clone(),
        step.step_number,
        channels.snapshot(),
        ctx.user_context(),
        CheckpointMetadata {
            source: CheckpointSource::Loop,
            step_number: step.step_number,
            executed_nodes: executed_nodes_total.to_vec(),
            parent_checkpoint_id: None,
            tags: ctx.tags.clone(),
        },
    );
    let span = tracing::info_span!("checkpoint", thread = %ctx.thread_id, step = step.step_number);
    let _entered = span.enter();
    if let Err(error) = checkpointer.save(checkpoint).await {
        tracing::warn!(%error, "checkpoint save failed, continuing execution");
    }
}

/// Drive steps to a fixed point (or a terminal failure), honoring
/// interruption and wall-clock timeout ahead of every step and the
/// `max_steps` bound after each one. This is what `invoke`/`invoke_async`
/// run; `stream_reactive` instead drives [`step_once`] directly so it can
/// yield between steps.
pub(crate) async fn drive(
    channels: &mut ChannelRegistry,
    nodes: &NodeRegistry,
    executor: &ParallelExecutor,
    ctx: &ExecutionContext,
    checkpointer: Option<&Arc<dyn Checkpointer>>,
    mut executed_nodes_total: Vec<String>,
) -> Result<Vec<ExecutionStep>, ExecutionFailure> {
    let mut history = Vec::new();
    loop {
        if ctx.is_interrupted() {
            return Err(ExecutionFailure { error: EngineError::Interrupted, steps: history });
        }
        if ctx.wall_clock_exceeded() {
            return Err(ExecutionFailure { error: EngineError::wall_clock_timeout(ctx.elapsed()), steps: history });
        }

        match step_once(channels, nodes, executor, ctx, checkpointer, &mut executed_nodes_total).await {
            StepOutcome::Completed => break,
            StepOutcome::Failed(error, step) => {
                if let Some(step) = step {
                    history.push(step);
                }
                return Err(ExecutionFailure { error, steps: history });
            }
            StepOutcome::Advanced(step) => {
                let bounded = ctx.current_step() >= ctx.config.max_steps;
                history.push(step);
                if bounded {
                    break;
                }
            }
        }
    }
    Ok(history)
}
