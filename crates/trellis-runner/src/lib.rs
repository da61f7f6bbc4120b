//! Parallel DAG execution.
//!
//! The [`Runner`] drives a validated flow over a bounded worker pool using a
//! Kahn-style dynamic topological loop: steps whose parent count reaches
//! zero are submitted, completions decrement their dependents, and a failed
//! step's `on_error` policy decides whether the run stops, the descendants
//! are skipped, or execution continues.
//!
//! All shared state (per-step states, extracted outputs, the source view,
//! ready tracking) lives behind a single non-reentrant run lock that is
//! never held across template rendering or connector I/O; step tasks render
//! against a point-in-time snapshot taken under the lock.

mod error;
mod runner;
mod state;

pub use error::{RunnerError, StepError};
pub use runner::{RunHandle, Runner};
pub use state::{RunState, StatusView, StepPhase, StepState, StepView};
