use crate::config::SequenceConfig;
use crate::context::{Completion, Context};
use crate::error::WorkflowError;
use crate::step::{FnStep, Step, StepName, StepOutput};
use crate::timeout::{Skip, TimeoutEvent, TimeoutListener};
use crate::Args;
use std::fmt;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

/// An ordered list of steps, run one after another.
///
/// Each step starts only after the previous one completed: by returning a
/// value, by having all its reserved slots filled, or by an explicit
/// `next`/`end`. The first error skips every remaining step.
pub struct Sequence {
    steps: Vec<Box<dyn Step>>,
    config: SequenceConfig,
    listeners: Vec<TimeoutListener>,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// What the run loop does after a step completed.
enum Transition {
    Continue(Args),
    Finish(Result<Args, WorkflowError>),
}

impl Completion {
    fn into_transition(self) -> Transition {
        match self {
            Completion::Returned(value) => Transition::Continue(vec![value]),
            Completion::Collected(args) | Completion::Forced(args) => Transition::Continue(args),
            Completion::Ended(args) => Transition::Finish(Ok(args)),
            Completion::Failed(error) => Transition::Finish(Err(error)),
        }
    }
}

impl Sequence {
    /// Creates a new sequence builder.
    pub fn builder() -> SequenceBuilder {
        SequenceBuilder::new()
    }

    /// Returns the step names in execution order.
    pub fn step_names(&self) -> impl Iterator<Item = StepName> + '_ {
        self.steps.iter().map(|step| step.name())
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Starts the run and returns immediately.
    ///
    /// The first step runs on a freshly spawned tokio task, never inside this
    /// call. `terminal` is invoked exactly once, with `Err(error)` on
    /// short-circuit or `Ok(trailing arguments)` otherwise.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run<F>(self, terminal: F) -> Run
    where
        F: FnOnce(Result<Args, WorkflowError>) + Send + 'static,
    {
        let context = Context::new();
        for listener in &self.listeners {
            context.shared().add_listener(Arc::clone(listener));
        }

        let (tx, rx) = oneshot::channel();
        let driver = context.clone();
        tokio::spawn(async move {
            let outcome = self.drive(&driver).await;
            terminal(outcome.clone());
            // Nobody may be waiting on the handle.
            let _ = tx.send(outcome);
        });

        Run {
            context,
            outcome: rx,
        }
    }

    /// Starts the run without a terminal callback; await [`Run::join`] for
    /// the outcome.
    pub fn start(self) -> Run {
        self.run(|_| {})
    }

    async fn drive(&self, ctx: &Context) -> Result<Args, WorkflowError> {
        let mut args = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();
            let generation = ctx.shared().begin_step(index, name.clone());
            let step_ctx = ctx.bound_to(generation);

            let completion = self
                .execute_step(&step_ctx, step.as_ref(), args, generation)
                .await;

            match completion.into_transition() {
                Transition::Continue(next) => {
                    info!("Step '{}' completed successfully", name);
                    args = next;
                }
                Transition::Finish(Ok(values)) => {
                    info!("Step '{}' ended the run", name);
                    ctx.shared().terminate();
                    return Ok(values);
                }
                Transition::Finish(Err(error)) => {
                    warn!("Step '{}' failed: {}", name, error);
                    ctx.shared().terminate();
                    return Err(error);
                }
            }
        }

        debug!("All {} steps completed", self.steps.len());
        ctx.shared().terminate();
        Ok(args)
    }

    async fn execute_step(
        &self,
        ctx: &Context,
        step: &dyn Step,
        args: Args,
        generation: u64,
    ) -> Completion {
        let mut timer = self.config.armed_timeout().map(|d| Box::pin(sleep(d)));

        let output = {
            let execution = step.execute(ctx, args);
            tokio::pin!(execution);
            loop {
                tokio::select! {
                    biased;
                    output = &mut execution => break output,
                    _ = ctx.shared().wake.notified() => {
                        // Slot fills wake us too; only a forced completion
                        // cuts the execution short.
                        if let Some(completion) = ctx.shared().take_forced() {
                            debug!("Step completion forced while still executing");
                            return completion;
                        }
                    }
                    _ = expire(&mut timer) => {
                        timer = None;
                        self.signal_timeout(ctx, generation);
                    }
                }
            }
        };

        let mut returned = match output {
            Ok(StepOutput::Return(value)) => Some(value),
            Ok(StepOutput::Wait) => None,
            Err(error) => {
                ctx.end(Err(error));
                None
            }
        };

        loop {
            if let Some(completion) = ctx.shared().evaluate(&mut returned) {
                return completion;
            }
            tokio::select! {
                biased;
                _ = ctx.shared().wake.notified() => {}
                _ = expire(&mut timer) => {
                    timer = None;
                    self.signal_timeout(ctx, generation);
                }
            }
        }
    }

    fn signal_timeout(&self, ctx: &Context, generation: u64) {
        let Some(event) = ctx.shared().timeout_event(generation) else {
            return;
        };
        warn!("Timeout: {}", event);
        let skip = ctx.skip_handle(generation);
        for listener in ctx.shared().listeners() {
            listener(&event, &skip);
        }
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(deadline) => deadline.as_mut().await,
        None => pending().await,
    }
}

/// Handle to a run in flight.
///
/// Dropping it does not stop the run.
#[derive(Debug)]
pub struct Run {
    context: Context,
    outcome: oneshot::Receiver<Result<Args, WorkflowError>>,
}

impl Run {
    /// Returns the run's context, following whichever step is current.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Registers a timeout listener. See [`Context::on_timeout`].
    pub fn on_timeout<F>(self, listener: F) -> Self
    where
        F: Fn(&TimeoutEvent, &Skip) + Send + Sync + 'static,
    {
        self.context.on_timeout(listener);
        self
    }

    /// Waits for the run to finish and returns what the terminal callback
    /// received.
    pub async fn join(self) -> Result<Args, WorkflowError> {
        self.outcome
            .await
            .unwrap_or_else(|_| Err(WorkflowError::aborted("run task stopped before completing")))
    }
}

/// Starts `steps` with `config`; shorthand for the builder.
pub fn run<F>(steps: Vec<Box<dyn Step>>, config: SequenceConfig, terminal: F) -> Run
where
    F: FnOnce(Result<Args, WorkflowError>) + Send + 'static,
{
    Sequence {
        steps,
        config,
        listeners: Vec::new(),
    }
    .run(terminal)
}

/// Builder for constructing [`Sequence`] instances.
#[derive(Default)]
pub struct SequenceBuilder {
    steps: Vec<Box<dyn Step>>,
    config: SequenceConfig,
    listeners: Vec<TimeoutListener>,
}

impl fmt::Debug for SequenceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceBuilder")
            .field("steps", &self.steps.len())
            .field("config", &self.config)
            .finish()
    }
}

impl SequenceBuilder {
    /// Creates a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step value.
    pub fn add_step<S: Step + 'static>(mut self, step: S) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Appends a step using its `Default` value.
    pub fn add<S: Step + Default + 'static>(self) -> Self {
        self.add_step(S::default())
    }

    /// Appends a closure step.
    pub fn step<F>(self, name: impl Into<StepName>, f: F) -> Self
    where
        F: Fn(&Context, Args) -> Result<StepOutput, WorkflowError> + Send + Sync + 'static,
    {
        self.add_step(FnStep::new(name, f))
    }

    /// Replaces the run configuration.
    pub fn config(mut self, config: SequenceConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-step timeout. A zero duration disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = SequenceConfig::with_timeout(timeout);
        self
    }

    /// Registers a timeout listener before the run starts.
    pub fn on_timeout<F>(mut self, listener: F) -> Self
    where
        F: Fn(&TimeoutEvent, &Skip) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Builds the sequence.
    pub fn build(self) -> Sequence {
        Sequence {
            steps: self.steps,
            config: self.config,
            listeners: self.listeners,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_step;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    define_step!(SuccessStep);

    #[async_trait]
    impl Step for SuccessStep {
        async fn execute(&self, _ctx: &Context, _args: Args) -> Result<StepOutput, WorkflowError> {
            Ok(StepOutput::value("success"))
        }
    }

    define_step!(FailureStep);

    #[async_trait]
    impl Step for FailureStep {
        async fn execute(&self, _ctx: &Context, _args: Args) -> Result<StepOutput, WorkflowError> {
            Err(WorkflowError::step(self.name(), "Intentional failure"))
        }
    }

    #[tokio::test]
    async fn test_sequence_success() {
        let run = Sequence::builder().add::<SuccessStep>().build().start();
        assert_eq!(run.join().await, Ok(vec![json!("success")]));
    }

    #[tokio::test]
    async fn test_sequence_failure() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reached);

        let run = Sequence::builder()
            .add::<FailureStep>()
            .step("unreachable", move |_ctx, _args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(StepOutput::done())
            })
            .build()
            .start();

        match run.join().await {
            Err(WorkflowError::StepError { step_name, details }) => {
                assert_eq!(step_name, "FailureStep");
                assert_eq!(details, "Intentional failure");
            }
            other => panic!("Unexpected outcome: {:?}", other),
        }
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_sequence() {
        let sequence = Sequence::builder().build();
        assert!(sequence.is_empty());
        assert_eq!(sequence.start().join().await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_builder_keeps_order() {
        let sequence = Sequence::builder()
            .step("a", |_ctx, _args| Ok(StepOutput::done()))
            .add::<SuccessStep>()
            .step("c", |_ctx, _args| Ok(StepOutput::done()))
            .timeout(Duration::from_millis(5))
            .build();

        let names: Vec<_> = sequence.step_names().collect();
        assert_eq!(names, vec!["a", "SuccessStep", "c"]);
        assert_eq!(sequence.len(), 3);
        assert_eq!(
            sequence.config().armed_timeout(),
            Some(Duration::from_millis(5))
        );
    }

    #[tokio::test]
    async fn test_run_function() {
        let (tx, rx) = oneshot::channel();
        let steps: Vec<Box<dyn Step>> = vec![Box::new(SuccessStep)];
        run(steps, SequenceConfig::default(), move |outcome| {
            let _ = tx.send(outcome);
        });
        assert_eq!(rx.await.unwrap(), Ok(vec![json!("success")]));
    }
}
