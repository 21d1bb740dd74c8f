use crate::error::WorkflowError;
use crate::merge::MergeMode;
use crate::result_set::{Fulfill, ResultSet};
use crate::step::StepName;
use crate::timeout::{Skip, TimeoutEvent, TimeoutListener};
use crate::Args;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Scheduled, first step not entered yet.
    NotStarted,
    /// Executing or waiting on the step at this index.
    Running(usize),
    /// The terminal callback has been (or is being) invoked.
    Terminated,
}

/// How a step finished. Every completion path produces exactly one of these
/// and the run loop consumes them uniformly.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Completion {
    /// The step returned a value and allocated nothing.
    Returned(Value),
    /// Every slot was filled; values already merged.
    Collected(Args),
    /// `next(Ok(..))` or a timeout skip.
    Forced(Args),
    /// `end(Ok(..))`.
    Ended(Args),
    /// Any error, from whichever source.
    Failed(WorkflowError),
}

pub(crate) struct RunState {
    pub(crate) phase: Phase,
    pub(crate) generation: u64,
    pub(crate) step_name: Option<StepName>,
    pub(crate) step_started: Instant,
    pub(crate) results: ResultSet,
    pub(crate) moved_on: bool,
    pub(crate) forced: Option<Completion>,
}

impl RunState {
    /// A slot or control call tagged with `generation` may still touch the
    /// current step.
    pub(crate) fn accepts(&self, generation: u64) -> bool {
        matches!(self.phase, Phase::Running(_)) && !self.moved_on && self.generation == generation
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<RunState>,
    pub(crate) wake: Notify,
    listeners: Mutex<Vec<TimeoutListener>>,
    started_at: Instant,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(RunState {
                phase: Phase::NotStarted,
                generation: 0,
                step_name: None,
                step_started: Instant::now(),
                results: ResultSet::new(),
                moved_on: false,
                forced: None,
            }),
            wake: Notify::new(),
            listeners: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    /// Records a forced completion for the step tagged `generation` (the
    /// current one when `None`). The first forced completion of a step wins.
    pub(crate) fn force(&self, generation: Option<u64>, completion: Completion) -> bool {
        let recorded = {
            let mut state = self.state.lock();
            let target = generation.unwrap_or(state.generation);
            if state.accepts(target) {
                state.moved_on = true;
                state.forced = Some(completion);
                true
            } else {
                false
            }
        };
        if recorded {
            self.wake.notify_one();
        } else {
            debug!("Ignoring control call for a step that already moved on");
        }
        recorded
    }

    pub(crate) fn begin_step(&self, index: usize, name: StepName) -> u64 {
        let mut state = self.state.lock();
        state.generation += 1;
        state.phase = Phase::Running(index);
        state.step_name = Some(name);
        state.step_started = Instant::now();
        state.results = ResultSet::new();
        state.moved_on = false;
        state.forced = None;
        state.generation
    }

    /// Takes a forced completion recorded while the step is still executing.
    pub(crate) fn take_forced(&self) -> Option<Completion> {
        self.state.lock().forced.take()
    }

    /// Decides whether the current step is done. `returned` is the value the
    /// step returned, consumed only when the step allocated nothing.
    pub(crate) fn evaluate(&self, returned: &mut Option<Value>) -> Option<Completion> {
        let mut state = self.state.lock();
        if let Some(completion) = state.forced.take() {
            return Some(completion);
        }
        if state.moved_on {
            return None;
        }
        let completion = if state.results.is_empty() {
            returned.take().map(Completion::Returned)
        } else if let Some(error) = state.results.first_error() {
            Some(Completion::Failed(error.clone()))
        } else if state.results.is_complete() {
            Some(Completion::Collected(state.results.merged()))
        } else {
            None
        };
        if completion.is_some() {
            state.moved_on = true;
        }
        completion
    }

    /// Snapshot for a timeout signal, or `None` if the step tagged
    /// `generation` already completed.
    pub(crate) fn timeout_event(&self, generation: u64) -> Option<TimeoutEvent> {
        let state = self.state.lock();
        if !state.accepts(generation) {
            return None;
        }
        let step_index = match state.phase {
            Phase::Running(index) => index,
            _ => 0,
        };
        Some(TimeoutEvent {
            step_index,
            step_name: state
                .step_name
                .clone()
                .unwrap_or_else(|| StepName::new("unknown")),
            elapsed: state.step_started.elapsed(),
            allocated: state.results.len(),
            pending: state.results.pending(),
        })
    }

    pub(crate) fn listeners(&self) -> Vec<TimeoutListener> {
        self.listeners.lock().clone()
    }

    pub(crate) fn add_listener(&self, listener: TimeoutListener) {
        self.listeners.lock().push(listener);
    }

    pub(crate) fn terminate(&self) {
        let mut state = self.state.lock();
        state.phase = Phase::Terminated;
        state.moved_on = true;
        state.forced = None;
    }
}

/// The per-run coordinator handed to every step.
///
/// A step uses it to reserve result slots ([`push`](Context::push),
/// [`group`](Context::group), [`group_of`](Context::group_of) and the
/// mode-named shorthands) and to steer the run ([`next`](Context::next),
/// [`end`](Context::end)).
///
/// `Context` is a cheap handle: clone it into spawned tasks freely. The copy
/// a step receives is bound to that step, so once the step is over every
/// clone of it stops having any effect. The copy returned by
/// [`Run::context`](crate::Run::context) follows whichever step is current.
///
/// # Examples
///
/// ```
/// use stepwise::prelude::*;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let run = Sequence::builder()
///     .step("fan_out", |ctx, _args| {
///         for (slot, n) in ctx.group_of(3, None).into_iter().zip(1..) {
///             tokio::spawn(async move { slot.resolve(n * 10) });
///         }
///         Ok(StepOutput::Wait)
///     })
///     .build()
///     .start();
///
/// assert_eq!(run.join().await, Ok(vec![json!([10, 20, 30])]));
/// # }
/// ```
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
    bound: Option<u64>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Context")
            .field("phase", &state.phase)
            .field("generation", &state.generation)
            .field("bound", &self.bound)
            .field("slots", &state.results.len())
            .finish()
    }
}

impl Context {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            bound: None,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn bound_to(&self, generation: u64) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            bound: Some(generation),
        }
    }

    /// Reserves one slot and returns its fulfillment handle.
    ///
    /// A `Some` mode becomes the merge mode for the whole step.
    pub fn push(&self, mode: Option<MergeMode>) -> Fulfill {
        self.allocate(self.bound, mode)
    }

    /// Same as `push(Some(MergeMode::First))`.
    pub fn first(&self) -> Fulfill {
        self.push(Some(MergeMode::First))
    }

    /// Same as `push(Some(MergeMode::Spread))`.
    pub fn spread(&self) -> Fulfill {
        self.push(Some(MergeMode::Spread))
    }

    /// Same as `push(Some(MergeMode::Collapse))`.
    pub fn collapse(&self) -> Fulfill {
        self.push(Some(MergeMode::Collapse))
    }

    /// Returns a generator that reserves one slot per call, for fan-outs
    /// whose size is only known while iterating.
    pub fn group(&self, mode: Option<MergeMode>) -> Group {
        Group {
            context: self.bound_to(self.target_generation()),
            mode,
        }
    }

    /// Reserves `size` slots at once, in order. A `size` of zero reserves
    /// nothing.
    pub fn group_of(&self, size: usize, mode: Option<MergeMode>) -> Vec<Fulfill> {
        let bound = Some(self.target_generation());
        (0..size).map(|_| self.allocate(bound, mode)).collect()
    }

    fn target_generation(&self) -> u64 {
        self.bound
            .unwrap_or_else(|| self.shared.state.lock().generation)
    }

    fn allocate(&self, bound: Option<u64>, mode: Option<MergeMode>) -> Fulfill {
        let mut state = self.shared.state.lock();
        let generation = bound.unwrap_or(state.generation);
        if generation != state.generation {
            // The step is gone; hand out a handle nothing will ever accept.
            return Fulfill::new(Arc::clone(&self.shared), generation, usize::MAX);
        }
        let index = state.results.allocate(mode);
        Fulfill::new(Arc::clone(&self.shared), generation, index)
    }

    /// Completes the current step now.
    ///
    /// `Ok(values)` hands `values` to the next step as they are; `Err`
    /// short-circuits the run. Slots still pending become inert.
    pub fn next(&self, outcome: Result<Args, WorkflowError>) {
        let completion = match outcome {
            Ok(values) => Completion::Forced(values),
            Err(error) => Completion::Failed(error),
        };
        self.shared.force(self.bound, completion);
    }

    /// Completes the current step with what its slots collected so far:
    /// each slot's first value, `Null` where nothing arrived.
    pub fn next_with_results(&self) {
        let partial = self.partial();
        self.shared.force(self.bound, Completion::Forced(partial));
    }

    /// Terminates the run. No further step executes; the terminal callback
    /// receives `outcome`.
    pub fn end(&self, outcome: Result<Args, WorkflowError>) {
        let completion = match outcome {
            Ok(values) => Completion::Ended(values),
            Err(error) => Completion::Failed(error),
        };
        self.shared.force(self.bound, completion);
    }

    /// Terminates the run carrying what the current step collected so far.
    pub fn end_with_results(&self) {
        let partial = self.partial();
        self.shared.force(self.bound, Completion::Ended(partial));
    }

    fn partial(&self) -> Args {
        self.shared.state.lock().results.partial()
    }

    /// Registers a listener for the `timeout` signal.
    ///
    /// The listener receives diagnostic data and a [`Skip`] handle; calling
    /// [`Skip::skip`] abandons the slow step. Not calling it leaves the step
    /// waiting.
    pub fn on_timeout<F>(&self, listener: F)
    where
        F: Fn(&TimeoutEvent, &Skip) + Send + Sync + 'static,
    {
        self.shared.add_listener(Arc::new(listener));
    }

    /// Returns the lifecycle phase of the run.
    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Returns the index of the current step, if one is running.
    pub fn step_index(&self) -> Option<usize> {
        match self.phase() {
            Phase::Running(index) => Some(index),
            _ => None,
        }
    }

    /// Returns `true` once the run has ended.
    pub fn is_terminated(&self) -> bool {
        self.phase() == Phase::Terminated
    }

    /// Returns the time elapsed since the run was created.
    pub fn elapsed(&self) -> Duration {
        self.shared.started_at.elapsed()
    }

    pub(crate) fn skip_handle(&self, generation: u64) -> Skip {
        Skip::new(Arc::clone(&self.shared), generation)
    }
}

/// Slot generator returned by [`Context::group`].
///
/// Each call to [`Group::slot`] reserves one more slot in the step that
/// created the generator.
#[derive(Debug, Clone)]
pub struct Group {
    context: Context,
    mode: Option<MergeMode>,
}

impl Group {
    /// Reserves one slot.
    pub fn slot(&self) -> Fulfill {
        self.context.allocate(self.context.bound, self.mode)
    }
}
