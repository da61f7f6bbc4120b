use std::fmt;

use thiserror::Error;

/// One problem found while analyzing a flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
  #[error("step '{step}' depends on missing step '{dependency}'")]
  UnknownDependency { step: String, dependency: String },

  #[error("step '{step}' references output of missing step '{reference}'")]
  UnknownFlowReference { step: String, reference: String },

  #[error("duplicate step name '{name}'")]
  DuplicateStep { name: String },

  #[error("dependency cycle between steps: {}", .members.join(", "))]
  Cycle { members: Vec<String> },
}

/// Aggregate of every issue found in one analysis pass.
#[derive(Debug)]
pub struct ValidationError {
  pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "flow configuration is invalid:")?;
    for issue in &self.issues {
      writeln!(f, "  - {issue}")?;
    }
    Ok(())
  }
}

impl std::error::Error for ValidationError {}
