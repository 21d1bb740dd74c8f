//! Commonly used types and traits

pub use crate::config::SequenceConfig;
pub use crate::context::Context;
pub use crate::define_step;
pub use crate::error::WorkflowError;
pub use crate::merge::MergeMode;
pub use crate::result_set::Fulfill;
pub use crate::step::{Step, StepName, StepOutput};
pub use crate::timeout::{Skip, TimeoutEvent};
pub use crate::workflow::Sequence;
pub use crate::Args;
