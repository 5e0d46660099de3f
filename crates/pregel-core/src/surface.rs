//! Invocation surfaces (C11): the five ways a caller drives an [`Engine`].
//!
//! `invoke`/`invoke_async` run the whole graph and hand back the output.
//! `stream` also runs the whole graph to completion — it is a *lazy, finite*
//! sequence over the recorded step history, not an incremental feed; a
//! subscriber only sees anything once the run is already over. The one
//! genuinely incremental surface is `stream_reactive`, which yields each
//! [`ExecutionStep`] as its step completes and stops driving further steps
//! the moment its subscriber drops the stream — ordinary Rust stream
//! cancellation, no separate cancel handle needed.

use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures::Stream;
use pregel_checkpoint::Checkpointer;
use serde_json::Value;
use uuid::Uuid;

use crate::context::{ExecutionContext, ExecutionFailure, ExecutionResult, ExecutionStep, RuntimeConfig};
use crate::driver::{drive, seed, step_once, StepOutcome};
use crate::error::{EngineError, EngineResult};
use crate::executor::ParallelExecutor;
use crate::graph::Engine;

fn read_output(channels: &pregel_checkpoint::ChannelRegistry, config: &crate::context::EngineConfig) -> EngineResult<Value> {
    match config.output_channels.first() {
        None => Ok(Value::Null),
        Some(name) => Ok(channels.get(name)?),
    }
}

impl Engine {
    /// Run the graph to completion (or failure) and return the full
    /// terminal record. The other `invoke*` surfaces are thin projections of
    /// this one.
    pub async fn invoke_full(&self, input: Value, runtime: RuntimeConfig) -> Result<ExecutionResult, ExecutionFailure> {
        let total_start = Instant::now();
        let mut channels = self.channel_template.copy();
        seed(&mut channels, &self.config, &input).map_err(|error| ExecutionFailure { error, steps: Vec::new() })?;

        let thread_id = runtime.thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let ctx = ExecutionContext::with_user_context(
            thread_id,
            self.config.clone(),
            runtime.tags,
            runtime.initial_user_context.unwrap_or(Value::Null),
        );
        let executor = ParallelExecutor::new(self.config.worker_pool_size);
        let steps = drive(&mut channels, &self.nodes, &executor, &ctx, self.checkpointer.as_ref(), Vec::new()).await?;

        let output = read_output(&channels, &self.config)
            .map_err(|error| ExecutionFailure { error, steps: steps.clone() })?;
        Ok(ExecutionResult {
            success: true,
            output: Some(output),
            steps,
            total_duration: total_start.elapsed(),
            error: None,
        })
    }

    /// Run the graph to completion and return just its output — the
    /// `invoke_async` surface; callers off the Tokio runtime should use
    /// [`Engine::invoke_blocking`] instead.
    pub async fn invoke(&self, input: Value, runtime: RuntimeConfig) -> EngineResult<Value> {
        self.invoke_full(input, runtime).await.map(|result| result.output.unwrap_or(Value::Null)).map_err(EngineError::from)
    }

    /// Synchronous `invoke`. Spins up a dedicated current-thread Tokio
    /// runtime to drive the engine, so this must *not* be called from inside
    /// an already-running Tokio runtime (that panics, by Tokio's own rules —
    /// use `invoke`/`invoke_async` there instead).
    pub fn invoke_blocking(&self, input: Value, runtime: RuntimeConfig) -> EngineResult<Value> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("building a current-thread Tokio runtime for invoke_blocking")
            .block_on(self.invoke(input, runtime))
    }

    /// Run the graph to completion and hand back its recorded step history
    /// as a finite sequence. Deliberately *not* incremental: every step has
    /// already happened by the time this returns — see [`Engine::stream_reactive`]
    /// for a surface that actually yields as steps complete.
    pub async fn stream(
        &self,
        input: Value,
        runtime: RuntimeConfig,
    ) -> Result<impl Stream<Item = ExecutionStep>, ExecutionFailure> {
        let result = self.invoke_full(input, runtime).await?;
        Ok(tokio_stream::iter(result.steps))
    }

    /// Cold, incremental stream of [`ExecutionStep`]s: nothing runs until
    /// polled, and each step executes just before it is yielded. Dropping
    /// the stream after any number of items stops the driver cleanly before
    /// the next step — no node from a not-yet-started step ever runs.
    pub fn stream_reactive(&self, input: Value, runtime: RuntimeConfig) -> impl Stream<Item = EngineResult<ExecutionStep>> + '_ {
        stream! {
            let mut channels = self.channel_template.copy();
            if let Err(error) = seed(&mut channels, &self.config, &input) {
                yield Err(error);
                return;
            }

            let thread_id = runtime.thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let ctx = ExecutionContext::with_user_context(
                thread_id,
                self.config.clone(),
                runtime.tags,
                runtime.initial_user_context.unwrap_or(Value::Null),
            );
            let executor = ParallelExecutor::new(self.config.worker_pool_size);
            let mut executed_nodes_total = Vec::new();

            loop {
                if ctx.is_interrupted() {
                    yield Err(EngineError::Interrupted);
                    return;
                }
                if ctx.wall_clock_exceeded() {
                    yield Err(EngineError::wall_clock_timeout(ctx.elapsed()));
                    return;
                }

                match step_once(&mut channels, &self.nodes, &executor, &ctx, self.checkpointer.as_ref(), &mut executed_nodes_total).await {
                    StepOutcome::Completed => return,
                    StepOutcome::Failed(error, step) => {
                        if let Some(step) = step {
                            yield Ok(step);
                        }
                        yield Err(error);
                        return;
                    }
                    StepOutcome::Advanced(step) => {
                        let bounded = ctx.current_step() >= self.config.max_steps;
                        yield Ok(step);
                        if bounded {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Cold single-value stream wrapping [`Engine::invoke`] — useful when a
    /// caller wants `invoke`'s semantics behind the same `Stream` interface
    /// as [`Engine::stream_reactive`], e.g. to compose both behind one
    /// trait object.
    pub fn invoke_reactive(&self, input: Value, runtime: RuntimeConfig) -> impl Stream<Item = EngineResult<Value>> + '_ {
        stream! {
            yield self.invoke(input, runtime).await;
        }
    }

    /// Restore a thread's channel state from a checkpoint (the most recent
    /// one, if `checkpoint_id` is absent) and resume the driver loop from
    /// where it left off. Per the checkpoint protocol, a restored registry's
    /// dirty set is empty unless the checkpointed channels happen to include
    /// ones still dirty at snapshot time — so this alone rarely advances the
    /// graph; it exists to rehydrate state (and read output) without forcing
    /// new work. Callers intending to continue a paused conversation should
    /// seed new input through `invoke`'s input channels afterward.
    pub async fn resume_from(&self, thread_id: &str, checkpoint_id: Option<&str>) -> Result<Value, ExecutionFailure> {
        let checkpointer = self
            .checkpointer
            .clone()
            .ok_or_else(|| ExecutionFailure { error: EngineError::ResumeNotConfigured, steps: Vec::new() })?;

        let loaded = match checkpoint_id {
            Some(id) => checkpointer.load(id).await,
            None => checkpointer.load_latest(thread_id).await,
        };
        let checkpoint = loaded
            .map_err(|error| ExecutionFailure { error: EngineError::CheckpointFailure(error), steps: Vec::new() })?
            .ok_or_else(|| ExecutionFailure {
                error: EngineError::Configuration(format!("no checkpoint found for thread '{thread_id}'")),
                steps: Vec::new(),
            })?;

        let mut channels = self.channel_template.copy();
        channels
            .restore(&checkpoint.channel_states)
            .map_err(|error| ExecutionFailure { error: error.into(), steps: Vec::new() })?;

        let ctx = ExecutionContext::with_user_context(
            checkpoint.thread_id.clone(),
            self.config.clone(),
            checkpoint.metadata.tags.clone(),
            checkpoint.user_context.clone(),
        );
        ctx.set_current_step(checkpoint.step_number + 1);

        let executor = ParallelExecutor::new(self.config.worker_pool_size);
        let steps = drive(
            &mut channels,
            &self.nodes,
            &executor,
            &ctx,
            self.checkpointer.as_ref(),
            checkpoint.metadata.executed_nodes.clone(),
        )
        .await?;
        read_output(&channels, &self.config).map_err(|error| ExecutionFailure { error, steps })
    }
}
