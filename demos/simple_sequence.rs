//! Minimal sequence: synchronous return values chained between steps.

use serde_json::json;
use stepwise::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let run = Sequence::builder()
        .step("load", |_ctx, _args| {
            println!("Loading data...");
            Ok(StepOutput::value(json!(["alpha", "beta"])))
        })
        .step("count", |_ctx, args| {
            let items = args[0].as_array().map(Vec::len).unwrap_or_default();
            println!("Counted {} items", items);
            Ok(StepOutput::value(items))
        })
        .build()
        .start();

    match run.join().await {
        Ok(values) => println!("Sequence completed successfully: {:?}", values),
        Err(error) => println!("Sequence failed: {}", error),
    }

    Ok(())
}
