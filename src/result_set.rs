//! Ordered result slots collected during one step.

use crate::context::Shared;
use crate::error::WorkflowError;
use crate::merge::{self, MergeMode};
use crate::Args;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Pending,
    Filled(Result<Args, WorkflowError>),
}

/// The slots reserved by the step currently executing.
///
/// Slots are appended by allocation and filled later, in any order. Their
/// position, not the order in which they are filled, decides where their
/// values land in the merged arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    slots: Vec<Slot>,
    mode: MergeMode,
}

impl ResultSet {
    /// Creates an empty result set using [`MergeMode::First`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pending slot and returns its index.
    ///
    /// A `Some` mode replaces the mode of the whole set.
    pub fn allocate(&mut self, mode: Option<MergeMode>) -> usize {
        if let Some(mode) = mode {
            self.mode = mode;
        }
        self.slots.push(Slot::Pending);
        self.slots.len() - 1
    }

    /// Fills a pending slot. Returns `false` if the slot does not exist or
    /// was already filled.
    pub fn fill(&mut self, index: usize, outcome: Result<Args, WorkflowError>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot @ Slot::Pending) => {
                *slot = Slot::Filled(outcome);
                true
            }
            _ => false,
        }
    }

    /// Returns the number of allocated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing was allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of slots still waiting for their value.
    pub fn pending(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Pending))
            .count()
    }

    /// Returns the merge mode that governs this set.
    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    /// Returns `true` once at least one slot exists and all are filled.
    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.pending() == 0
    }

    /// Returns the error of the earliest-allocated slot filled with one.
    pub fn first_error(&self) -> Option<&WorkflowError> {
        self.slots.iter().find_map(|slot| match slot {
            Slot::Filled(Err(error)) => Some(error),
            _ => None,
        })
    }

    /// Resolves the filled values into the next step's arguments.
    pub fn merged(&self) -> Args {
        let values: Vec<Args> = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Filled(Ok(values)) => values.clone(),
                _ => Vec::new(),
            })
            .collect();
        merge::resolve(self.mode, &values)
    }

    /// Returns the first value of every slot, `Null` where nothing arrived.
    pub fn partial(&self) -> Args {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Filled(Ok(values)) => values.first().cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            })
            .collect()
    }
}

/// Fulfillment handle for one reserved slot.
///
/// Hand it to whatever asynchronous operation produces the slot's value and
/// call it exactly once when that operation finishes. The handle is consumed
/// by the call. It is `Send`, so it can move into spawned tasks, and it
/// becomes inert once its step has moved on: late results are dropped.
pub struct Fulfill {
    shared: Arc<Shared>,
    generation: u64,
    index: usize,
}

impl fmt::Debug for Fulfill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fulfill")
            .field("generation", &self.generation)
            .field("index", &self.index)
            .finish()
    }
}

impl Fulfill {
    pub(crate) fn new(shared: Arc<Shared>, generation: u64, index: usize) -> Self {
        Self {
            shared,
            generation,
            index,
        }
    }

    /// Returns the slot's position in its result set.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Node-style completion: `Err` short-circuits the step, `Ok` carries
    /// the slot's values.
    pub fn call(self, outcome: Result<Args, WorkflowError>) {
        let accepted = {
            let mut state = self.shared.state.lock();
            state.accepts(self.generation) && state.results.fill(self.index, outcome)
        };
        if accepted {
            self.shared.wake.notify_one();
        } else {
            debug!(
                "Discarding stale result for slot {} of generation {}",
                self.index, self.generation
            );
        }
    }

    /// Fills the slot with a single value.
    pub fn resolve(self, value: impl Into<Value>) {
        self.call(Ok(vec![value.into()]));
    }

    /// Fills the slot with several values.
    pub fn resolve_all(self, values: Args) {
        self.call(Ok(values));
    }

    /// Fills the slot without any value.
    pub fn done(self) {
        self.call(Ok(Vec::new()));
    }

    /// Fills the slot with an error.
    pub fn reject(self, error: impl Into<WorkflowError>) {
        self.call(Err(error.into()));
    }
}
