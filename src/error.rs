use crate::step::StepName;
use std::fmt;
use thiserror::Error;

/// Errors that short-circuit a run.
///
/// Every failure path converges here: a step returning `Err`, a slot
/// fulfilled with an error, or an explicit `next(Err(..))` / `end(Err(..))`.
/// Whatever the source, the terminal callback receives exactly one of these
/// and the remaining steps are skipped.
///
/// # Non-Exhaustive
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code. When matching
/// on this error, always include a wildcard pattern:
///
/// ```
/// use stepwise::WorkflowError;
///
/// fn describe(error: &WorkflowError) -> String {
///     match error {
///         WorkflowError::StepError { step_name, details } => {
///             format!("step {} failed: {}", step_name, details)
///         }
///         WorkflowError::Rejected { details } => format!("rejected: {}", details),
///         WorkflowError::Aborted(reason) => format!("aborted: {}", reason),
///         _ => error.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkflowError {
    /// A step failed during execution.
    ///
    /// Returned from [`Step::execute`](crate::Step::execute), this is treated
    /// exactly like the step calling `end(Err(..))`.
    #[error("Step failed: {step_name}, details: {details}")]
    StepError {
        /// The name of the step that failed
        step_name: StepName,
        /// Details about the failure
        details: String,
    },

    /// An asynchronous operation reported failure through its slot.
    #[error("Operation rejected: {details}")]
    Rejected {
        /// Details about the failure
        details: String,
    },

    /// The run was stopped on purpose by a step.
    #[error("Run aborted: {0}")]
    Aborted(String),

    /// The sequence configuration is invalid.
    #[error("Invalid sequence configuration: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Creates a [`WorkflowError::StepError`] for the named step.
    pub fn step(step_name: impl Into<StepName>, details: impl fmt::Display) -> Self {
        WorkflowError::StepError {
            step_name: step_name.into(),
            details: details.to_string(),
        }
    }

    /// Creates a [`WorkflowError::Rejected`] from any displayable error.
    pub fn rejected(details: impl fmt::Display) -> Self {
        WorkflowError::Rejected {
            details: details.to_string(),
        }
    }

    /// Creates a [`WorkflowError::Aborted`] with the given reason.
    pub fn aborted(reason: impl Into<String>) -> Self {
        WorkflowError::Aborted(reason.into())
    }
}

impl From<&str> for WorkflowError {
    fn from(details: &str) -> Self {
        WorkflowError::rejected(details)
    }
}

impl From<String> for WorkflowError {
    fn from(details: String) -> Self {
        WorkflowError::Rejected { details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WorkflowError::StepError {
            step_name: StepName::new("test_step"),
            details: "test error".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Step failed: test_step, details: test error"
        );

        let rejected = WorkflowError::rejected("connection reset");
        assert_eq!(rejected.to_string(), "Operation rejected: connection reset");
        assert_eq!(WorkflowError::from("connection reset"), rejected);
        assert_eq!(WorkflowError::from(String::from("connection reset")), rejected);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(
            WorkflowError::step("load", 42),
            WorkflowError::StepError {
                step_name: StepName::new("load"),
                details: "42".to_string(),
            }
        );
        assert_eq!(
            WorkflowError::aborted("user cancelled").to_string(),
            "Run aborted: user cancelled"
        );
        assert_eq!(
            WorkflowError::Configuration("bad mode".to_string()).to_string(),
            "Invalid sequence configuration: bad mode"
        );
    }
}
