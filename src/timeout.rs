//! Per-step timeout signalling.

use crate::context::{Completion, Shared};
use crate::step::StepName;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Listener invoked when a step outlives the configured timeout.
pub(crate) type TimeoutListener = Arc<dyn Fn(&TimeoutEvent, &Skip) + Send + Sync>;

/// Diagnostic data handed to timeout listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutEvent {
    /// Zero-based position of the slow step.
    pub step_index: usize,
    /// Name of the slow step.
    pub step_name: StepName,
    /// Time spent in the step so far.
    pub elapsed: Duration,
    /// Number of slots the step allocated.
    pub allocated: usize,
    /// Number of those slots still waiting.
    pub pending: usize,
}

impl fmt::Display for TimeoutEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step '{}' (#{}) still running after {:?}, {}/{} slots pending",
            self.step_name, self.step_index, self.elapsed, self.pending, self.allocated
        )
    }
}

/// Abandons the step that timed out.
///
/// Calling [`Skip::skip`] completes that step with no values, exactly like
/// `next(Ok(vec![]))`. Once the step has moved on the handle does nothing.
#[derive(Clone)]
pub struct Skip {
    shared: Arc<Shared>,
    generation: u64,
}

impl fmt::Debug for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skip")
            .field("generation", &self.generation)
            .finish()
    }
}

impl Skip {
    pub(crate) fn new(shared: Arc<Shared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Completes the timed-out step with no values.
    pub fn skip(&self) {
        self.shared
            .force(Some(self.generation), Completion::Forced(Vec::new()));
    }
}
