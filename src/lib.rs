//! # Stepwise
//!
//! An asynchronous step-sequencing engine for Rust.
//!
//! A run executes an ordered list of steps. Each step may start any number
//! of concurrent operations and hand each one a slot to report into; the
//! next step starts once every slot is filled, with the results merged in
//! the order the slots were reserved, whatever order they arrived in. The
//! first error skips the remaining steps and late results are dropped.
//!
//! ## Features
//!
//! - **Callback barriers**: [`Context::push`], [`Context::group`] and
//!   [`Context::group_of`] reserve slots; [`Fulfill`] handles fill them from
//!   any task
//! - **Deterministic merging**: [`MergeMode`] `first`, `spread` or `collapse`
//! - **Explicit control**: [`Context::next`] and [`Context::end`]
//! - **Advisory timeouts**: per-step timer with a skippable `timeout` signal
//! - **Error Handling**: Structured errors with `thiserror`, one terminal
//!   outcome per run
//!
//! ## Quick Start
//!
//! ```rust
//! use stepwise::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let run = Sequence::builder()
//!     .step("load", |_ctx, _args| Ok(StepOutput::value(json!([1, 2]))))
//!     .step("double", |ctx, args| {
//!         let numbers = args[0].as_array().cloned().unwrap_or_default();
//!         let group = ctx.group(None);
//!         for n in numbers {
//!             let slot = group.slot();
//!             tokio::spawn(async move {
//!                 slot.resolve(n.as_i64().unwrap_or_default() * 2);
//!             });
//!         }
//!         Ok(StepOutput::Wait)
//!     })
//!     .build()
//!     .start();
//!
//! assert_eq!(run.join().await, Ok(vec![json!([2, 4])]));
//! # }
//! ```
//!
//! ## Merge Modes
//!
//! ```rust
//! use stepwise::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let run = Sequence::builder()
//!     .step("pairs", |ctx, _args| {
//!         let slots = ctx.group_of(2, Some(MergeMode::Collapse));
//!         let mut slots = slots.into_iter();
//!         if let (Some(a), Some(b)) = (slots.next(), slots.next()) {
//!             b.resolve_all(vec![json!(2), json!(4)]);
//!             a.resolve_all(vec![json!(1), json!(3)]);
//!         }
//!         Ok(StepOutput::Wait)
//!     })
//!     .build()
//!     .start();
//!
//! assert_eq!(run.join().await, Ok(vec![json!([[1, 3], [2, 4]])]));
//! # }
//! ```
//!
//! ## Timeouts
//!
//! ```rust
//! use stepwise::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let run = Sequence::builder()
//!     .step("stuck", |ctx, _args| {
//!         let _never_filled = ctx.push(None);
//!         Ok(StepOutput::Wait)
//!     })
//!     .timeout(Duration::from_millis(10))
//!     .on_timeout(|event, skip| {
//!         eprintln!("{}", event);
//!         skip.skip();
//!     })
//!     .build()
//!     .start();
//!
//! assert_eq!(run.join().await, Ok(vec![]));
//! # }
//! ```

mod config;
mod context;
mod error;
mod merge;
mod result_set;
mod step;
mod timeout;
mod workflow;

pub mod prelude;

/// Trailing arguments passed from one step to the next.
pub type Args = Vec<serde_json::Value>;

pub use config::SequenceConfig;
pub use context::{Context, Group, Phase};
pub use error::WorkflowError;
pub use merge::{resolve as merge_results, MergeMode};
pub use result_set::{Fulfill, ResultSet};
pub use serde_json::Value;
pub use step::{FnStep, Step, StepName, StepOutput};
pub use timeout::{Skip, TimeoutEvent};
pub use workflow::{run, Run, Sequence, SequenceBuilder};

/// Macro to define a step with minimal boilerplate
///
/// This macro creates a step struct with:
/// - `const NAME: &'static str` - compile-time step name
/// - `Debug` derive
/// - `Default` implementation
///
/// # Example
///
/// ```rust
/// use stepwise::define_step;
///
/// define_step!(MyStep);
/// assert_eq!(MyStep::NAME, "MyStep");
/// ```
#[macro_export]
macro_rules! define_step {
    ($name:ident) => {
        #[derive(Debug, Default)]
        pub struct $name;

        impl $name {
            /// Step name as a compile-time constant
            #[allow(dead_code)]
            pub const NAME: &'static str = stringify!($name);
        }
    };
}
