use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pregel_checkpoint::LastValueChannel;
use pregel_core::context::{EngineConfig, RuntimeConfig};
use pregel_core::graph::{Engine, EngineBuilder};
use pregel_core::node::NodeBuilder;
use serde_json::{json, Value};

fn pipeline_engine(stages: usize) -> Engine {
    let mut builder = EngineBuilder::new().channel(Box::new(LastValueChannel::new("s0"))).unwrap();
    for i in 0..stages {
        let next = format!("s{}", i + 1);
        builder = builder.channel(Box::new(LastValueChannel::new(next.clone()))).unwrap();
        builder = builder
            .node(
                NodeBuilder::new(format!("stage{i}"))
                    .trigger(format!("s{i}"))
                    .write(next)
                    .processor(|v: Value| Box::pin(async move { Ok(json!(v.as_i64().unwrap_or(0) + 1)) }))
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }
    builder
        .config(EngineConfig {
            input_channels: vec!["s0".to_string()],
            output_channels: vec![format!("s{stages}")],
            ..Default::default()
        })
        .build()
        .unwrap()
}

fn invoke_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let engine = pipeline_engine(10);

    c.bench_function("invoke 10-stage pipeline", |b| {
        b.to_async(&runtime).iter(|| async {
            engine.invoke(black_box(json!(0)), RuntimeConfig::default()).await.unwrap();
        });
    });
}

fn parallel_fan_out_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut builder = EngineBuilder::new().channel(Box::new(LastValueChannel::new("source"))).unwrap();
    for i in 0..16 {
        let name = format!("fanned{i}");
        builder = builder.channel(Box::new(LastValueChannel::new(name.clone()))).unwrap();
        builder = builder
            .node(
                NodeBuilder::new(format!("worker{i}"))
                    .trigger("source")
                    .write(name)
                    .processor(|v: Value| Box::pin(async move { Ok(v) }))
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }
    let engine = builder
        .config(EngineConfig { input_channels: vec!["source".to_string()], ..Default::default() })
        .build()
        .unwrap();

    c.bench_function("invoke 16-way fan-out", |b| {
        b.to_async(&runtime).iter(|| async {
            engine.invoke(black_box(json!("payload")), RuntimeConfig::default()).await.unwrap();
        });
    });
}

criterion_group!(benches, invoke_benchmark, parallel_fan_out_benchmark);
criterion_main!(benches);
