//! Source resolution: from declarations to an executable flow.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::decl::{Config, OnErrorPolicy, OutputSpec, RunnerOptions, SourceDecl, SourceRef, StepDecl};
use crate::document::deep_merge;
use crate::error::ConfigError;

/// A fully resolved configuration, ready for dependency analysis.
#[derive(Debug, Clone, Default)]
pub struct Flow {
  pub sources: BTreeMap<String, SourceDecl>,
  pub steps: Vec<ResolvedStep>,
  pub runner: RunnerOptions,
}

/// A step whose source reference has been materialized into a canonical
/// `{type, configuration}` pair.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
  pub name: String,
  pub connector_type: String,
  pub configuration: Value,
  /// Set when the step's source was a named declaration; the runner merges
  /// the step's outputs back into that source's template view.
  pub source_name: Option<String>,
  pub input: Option<Value>,
  pub outputs: Vec<OutputSpec>,
  pub depends_on: Vec<String>,
  pub on_error: Option<OnErrorPolicy>,
}

impl Config {
  /// Materialize every step's source reference.
  ///
  /// For `base + override` the override document is deep-merged onto the
  /// serialized base declaration. Unknown named references fail with
  /// [`ConfigError::UnknownSource`].
  pub fn resolve(self) -> Result<Flow, ConfigError> {
    let mut steps = Vec::with_capacity(self.flow.len());
    for step in &self.flow {
      steps.push(resolve_step(step, &self.sources)?);
    }
    Ok(Flow {
      sources: self.sources,
      steps,
      runner: self.runner,
    })
  }
}

fn resolve_step(
  step: &StepDecl,
  sources: &BTreeMap<String, SourceDecl>,
) -> Result<ResolvedStep, ConfigError> {
  let (decl, source_name) = match &step.source {
    SourceRef::Named(name) => {
      let decl = sources
        .get(name)
        .ok_or_else(|| ConfigError::UnknownSource {
          step: step.name.clone(),
          source_name: name.clone(),
        })?
        .clone();
      (decl, Some(name.clone()))
    }
    SourceRef::Override { base, overlay } => {
      let base_decl = sources
        .get(base)
        .ok_or_else(|| ConfigError::UnknownSource {
          step: step.name.clone(),
          source_name: base.clone(),
        })?;
      let merged = deep_merge(
        serde_json::to_value(base_decl).map_err(|e| ConfigError::Invalid {
          message: e.to_string(),
        })?,
        overlay.clone(),
      );
      let decl: SourceDecl =
        serde_json::from_value(merged).map_err(|e| ConfigError::Invalid {
          message: format!("step '{}': invalid source override: {e}", step.name),
        })?;
      (decl, Some(base.clone()))
    }
    SourceRef::Inline(decl) => (decl.clone(), None),
  };

  Ok(ResolvedStep {
    name: step.name.clone(),
    connector_type: decl.connector_type,
    configuration: decl.configuration,
    source_name,
    input: step.input.clone(),
    outputs: step.output.clone(),
    depends_on: step.depends_on.clone(),
    on_error: step.on_error,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn config(doc: Value) -> Config {
    serde_json::from_value(doc).unwrap()
  }

  #[test]
  fn test_resolve_named_source() {
    let flow = config(json!({
      "sources": {
        "hr": {"type": "http", "configuration": {"url": "http://hr.local"}},
      },
      "flow": [{"name": "fetch", "source": "hr"}],
    }))
    .resolve()
    .unwrap();

    let step = &flow.steps[0];
    assert_eq!(step.connector_type, "http");
    assert_eq!(step.configuration["url"], json!("http://hr.local"));
    assert_eq!(step.source_name.as_deref(), Some("hr"));
  }

  #[test]
  fn test_resolve_override_deep_merges_configuration() {
    let flow = config(json!({
      "sources": {
        "hr": {"type": "http", "configuration": {"url": "http://hr.local", "timeout_ms": 500}},
      },
      "flow": [{
        "name": "fetch",
        "source": {"base": "hr", "override": {"configuration": {"timeout_ms": 50}}},
      }],
    }))
    .resolve()
    .unwrap();

    let step = &flow.steps[0];
    assert_eq!(step.configuration["url"], json!("http://hr.local"));
    assert_eq!(step.configuration["timeout_ms"], json!(50));
    assert_eq!(step.source_name.as_deref(), Some("hr"));
  }

  #[test]
  fn test_resolve_inline_source_has_no_source_name() {
    let flow = config(json!({
      "flow": [{
        "name": "run",
        "source": {"type": "process", "configuration": {"command": ["true"]}},
      }],
    }))
    .resolve()
    .unwrap();

    assert!(flow.steps[0].source_name.is_none());
  }

  #[test]
  fn test_resolve_unknown_base_fails() {
    let result = config(json!({
      "flow": [{"name": "x", "source": {"base": "ghost", "override": {}}}],
    }))
    .resolve();

    match result {
      Err(ConfigError::UnknownSource { step, source_name }) => {
        assert_eq!(step, "x");
        assert_eq!(source_name, "ghost");
      }
      other => panic!("expected UnknownSource, got {other:?}"),
    }
  }

  #[test]
  fn test_resolve_unknown_named_source_fails() {
    let result = config(json!({
      "flow": [{"name": "x", "source": "ghost"}],
    }))
    .resolve();

    assert!(matches!(result, Err(ConfigError::UnknownSource { .. })));
  }
}
