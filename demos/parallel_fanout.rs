//! Parallel fan-out with ordered aggregation.
//!
//! This example demonstrates:
//! 1. Reserving a dynamically sized group of slots
//! 2. Filling them from spawned tasks that finish in random order
//! 3. Receiving the merged results in reservation order
//! 4. Switching merge modes between steps

use serde_json::json;
use std::time::Duration;
use stepwise::prelude::*;

define_step!(ListServices);

#[async_trait::async_trait]
impl Step for ListServices {
    async fn execute(&self, _ctx: &Context, _args: Args) -> Result<StepOutput, WorkflowError> {
        Ok(StepOutput::value(json!(["gateway", "database", "cache"])))
    }
}

fn probe(ctx: &Context, args: Args) -> Result<StepOutput, WorkflowError> {
    let services = args
        .first()
        .and_then(|v| v.as_array())
        .cloned()
        .ok_or_else(|| WorkflowError::step("probe", "expected a list of services"))?;

    let group = ctx.group(Some(MergeMode::Collapse));
    for (i, service) in services.into_iter().enumerate() {
        let slot = group.slot();
        tokio::spawn(async move {
            let latency = 40 - 10 * i as u64;
            tokio::time::sleep(Duration::from_millis(latency)).await;
            println!("  {} answered after {}ms", service, latency);
            slot.resolve_all(vec![service, json!(latency)]);
        });
    }
    Ok(StepOutput::Wait)
}

fn report(_ctx: &Context, args: Args) -> Result<StepOutput, WorkflowError> {
    let rows = args[0].as_array().cloned().unwrap_or_default();
    for row in &rows {
        println!("{:>10}: {}ms", row[0].as_str().unwrap_or("?"), row[1]);
    }
    Ok(StepOutput::value(rows.len()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let (tx, rx) = tokio::sync::oneshot::channel();
    Sequence::builder()
        .add::<ListServices>()
        .step("probe", probe)
        .step("report", report)
        .build()
        .run(move |outcome| {
            let _ = tx.send(outcome);
        });

    match rx.await? {
        Ok(values) => println!("Probed {} services", values[0]),
        Err(error) => println!("Probe failed: {}", error),
    }

    Ok(())
}
