//! Configuration loading for trellis.
//!
//! A flow is declared across one or more YAML documents that are deep-merged
//! in order (later documents win). The merged document has three top-level
//! keys: `sources` (named connector declarations), `flow` (the ordered step
//! list) and `runner` (pool size and default error policy).
//!
//! Loading happens in two phases:
//! 1. [`load_documents`] parses and deep-merges the raw documents.
//! 2. [`Config::resolve`] materializes every step's source reference into a
//!    canonical `{type, configuration}` pair, producing a [`Flow`] that the
//!    analyzer and runner consume.

mod decl;
mod document;
mod error;
mod resolve;

pub use decl::{
  Config, OnErrorPolicy, OutputKind, OutputSpec, RunnerOptions, SourceDecl, SourceRef, StepDecl,
};
pub use document::{deep_merge, load_documents};
pub use error::ConfigError;
pub use resolve::{Flow, ResolvedStep};
