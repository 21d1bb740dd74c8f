//! Upload-style consumer with timeout supervision.
//!
//! Simulates storing a batch of files where one store hangs. The timeout
//! listener skips the slow step, and the caller only relies on the terminal
//! callback returning the list of stored paths.

use serde_json::json;
use std::time::Duration;
use stepwise::prelude::*;

fn store_files(ctx: &Context, _args: Args) -> Result<StepOutput, WorkflowError> {
    let files = ["cat.png", "dog.png", "huge.tiff"];
    for (slot, name) in ctx.group_of(files.len(), None).into_iter().zip(files) {
        tokio::spawn(async move {
            let delay = if name.ends_with(".tiff") { 5_000 } else { 20 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            slot.resolve(format!("/media/{}", name));
        });
    }
    Ok(StepOutput::Wait)
}

fn respond(_ctx: &Context, args: Args) -> Result<StepOutput, WorkflowError> {
    let paths = args.first().cloned().unwrap_or_else(|| json!([]));
    Ok(StepOutput::value(json!({ "files": paths })))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config: SequenceConfig = serde_json::from_str(r#"{"timeout": 200}"#)?;

    let run = Sequence::builder()
        .step("store", store_files)
        .step("respond", respond)
        .config(config)
        .on_timeout(|event, skip| {
            println!("{}; skipping", event);
            skip.skip();
        })
        .build()
        .start();

    match run.join().await {
        Ok(values) => println!("Upload response: {}", values[0]),
        Err(error) => println!("Upload failed: {}", error),
    }

    Ok(())
}
