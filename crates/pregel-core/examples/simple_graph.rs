//! Two-stage pipeline over a couple of `LastValue` channels, run to
//! completion with `invoke`.

use pregel_checkpoint::LastValueChannel;
use pregel_core::context::{EngineConfig, RuntimeConfig};
use pregel_core::graph::EngineBuilder;
use pregel_core::node::NodeBuilder;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Simple Graph Example ===\n");

    let engine = EngineBuilder::new()
        .channel(Box::new(LastValueChannel::new("input")))?
        .channel(Box::new(LastValueChannel::new("after_add")))?
        .channel(Box::new(LastValueChannel::new("output")))?
        .node(
            NodeBuilder::new("add_ten")
                .trigger("input")
                .write("after_add")
                .processor(|value| {
                    Box::pin(async move {
                        let n = value.as_i64().unwrap_or(0);
                        println!("add_ten: {n} + 10");
                        Ok(json!(n + 10))
                    })
                })
                .build()?,
        )?
        .node(
            NodeBuilder::new("double")
                .trigger("after_add")
                .write("output")
                .processor(|value| {
                    Box::pin(async move {
                        let n = value.as_i64().unwrap_or(0);
                        println!("double: {n} * 2");
                        Ok(json!(n * 2))
                    })
                })
                .build()?,
        )?
        .config(EngineConfig {
            input_channels: vec!["input".to_string()],
            output_channels: vec!["output".to_string()],
            ..Default::default()
        })
        .build()?;

    let input = json!(5);
    println!("Initial input: {input}\n");

    let result = engine.invoke_full(input, RuntimeConfig::default()).await?;

    println!("\nSteps executed: {}", result.steps.len());
    println!("Final output: {:?}", result.output);
    println!("Expected: (5 + 10) * 2 = 30");

    Ok(())
}
