use crate::context::Context;
use crate::error::WorkflowError;
use crate::Args;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Type-safe step name wrapper.
///
/// Names only serve diagnostics (logs, timeout events, errors); steps are
/// ordered by position, not looked up by name.
///
/// # Examples
///
/// ```
/// use stepwise::StepName;
///
/// let name = StepName::new("ProcessData");
/// assert_eq!(name.as_str(), "ProcessData");
///
/// let name: StepName = "ValidateInput".into();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a StepName from a type's name (extracts last segment)
    pub fn from_type_name<T: ?Sized>() -> Self {
        let full_name = std::any::type_name::<T>();
        let short_name = full_name.split("::").last().unwrap_or("UnknownStep");
        Self::new(short_name)
    }

    /// Returns the step name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// What a step reports when its `execute` call returns.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// A value available right away. If the step reserved no slots and did
    /// not call `next`/`end`, the next step receives exactly this value.
    Return(Value),
    /// Completion comes later: through the reserved slots, or through a
    /// `next`/`end` call from a task holding the context.
    Wait,
}

impl StepOutput {
    /// Returns `value` to the next step.
    pub fn value(value: impl Into<Value>) -> Self {
        StepOutput::Return(value.into())
    }

    /// Moves on with a single `Null` argument.
    pub fn done() -> Self {
        StepOutput::Return(Value::Null)
    }
}

/// One unit of sequential work.
///
/// A step receives the run's [`Context`] and the previous step's trailing
/// arguments. It can return a value straight away, reserve slots and fill
/// them from spawned tasks, or call [`Context::next`] / [`Context::end`].
/// Returning `Err` ends the run with that error.
///
/// # Examples
///
/// ```
/// use stepwise::prelude::*;
/// use async_trait::async_trait;
///
/// define_step!(Double);
///
/// #[async_trait]
/// impl Step for Double {
///     async fn execute(&self, _ctx: &Context, args: Args) -> Result<StepOutput, WorkflowError> {
///         let n = args.first().and_then(|v| v.as_i64()).unwrap_or_default();
///         Ok(StepOutput::value(n * 2))
///     }
/// }
///
/// assert_eq!(Double.name(), "Double");
/// ```
#[async_trait]
pub trait Step: Send + Sync {
    /// Executes the step logic.
    ///
    /// # Returns
    ///
    /// - `Ok(StepOutput::Return(value))` - hand `value` on, unless slots were reserved
    /// - `Ok(StepOutput::Wait)` - completion arrives through slots or `next`/`end`
    /// - `Err(error)` - end the run with `error`
    async fn execute(&self, ctx: &Context, args: Args) -> Result<StepOutput, WorkflowError>;

    /// Returns the step name.
    ///
    /// By default, uses the type name. Override to provide a custom name.
    fn name(&self) -> StepName {
        StepName::from_type_name::<Self>()
    }
}

/// A [`Step`] built from a plain closure.
///
/// Closures run synchronously inside the run loop; asynchronous work is
/// spawned and reported back through slots or the context.
pub struct FnStep<F> {
    name: StepName,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(&Context, Args) -> Result<StepOutput, WorkflowError> + Send + Sync,
{
    /// Wraps `f` under the given name.
    pub fn new(name: impl Into<StepName>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&Context, Args) -> Result<StepOutput, WorkflowError> + Send + Sync,
{
    async fn execute(&self, ctx: &Context, args: Args) -> Result<StepOutput, WorkflowError> {
        (self.f)(ctx, args)
    }

    fn name(&self) -> StepName {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_step;
    use serde_json::json;

    define_step!(TestStep);

    #[async_trait]
    impl Step for TestStep {
        async fn execute(&self, _ctx: &Context, args: Args) -> Result<StepOutput, WorkflowError> {
            Ok(StepOutput::value(args.len()))
        }
    }

    #[tokio::test]
    async fn test_step_execution() {
        let ctx = Context::new();
        let result = TestStep.execute(&ctx, vec![json!(1), json!(2)]).await;
        assert_eq!(result, Ok(StepOutput::Return(json!(2))));
    }

    #[test]
    fn test_step_name() {
        assert_eq!(TestStep.name(), StepName::new("TestStep"));
        assert_eq!(TestStep::NAME, "TestStep");
    }

    #[tokio::test]
    async fn test_fn_step() {
        let step = FnStep::new("echo", |_ctx: &Context, args: Args| {
            Ok(StepOutput::Return(Value::Array(args)))
        });
        assert_eq!(step.name(), "echo");

        let ctx = Context::new();
        let result = step.execute(&ctx, vec![json!("a")]).await;
        assert_eq!(result, Ok(StepOutput::value(json!(["a"]))));
    }

    #[test]
    fn test_step_output_helpers() {
        assert_eq!(StepOutput::done(), StepOutput::Return(Value::Null));
        assert_eq!(StepOutput::value("x"), StepOutput::Return(json!("x")));
    }
}
