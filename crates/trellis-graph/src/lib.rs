//! Dependency analysis for a resolved flow.
//!
//! Each step's dependency set is the union of its explicit `depends_on`
//! entries and the step names referenced as `flows.<name>` anywhere in its
//! source configuration or input templates. Validation aggregates every
//! problem it finds (unknown references, duplicate names, cycles) into a
//! single [`ValidationError`] instead of stopping at the first.

mod graph;
mod validate;

pub use graph::FlowGraph;
pub use validate::{ValidationError, ValidationIssue};
