//! Declaration types for the merged configuration document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The merged, still-unresolved configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub sources: BTreeMap<String, SourceDecl>,
  #[serde(default)]
  pub flow: Vec<StepDecl>,
  #[serde(default)]
  pub runner: RunnerOptions,
}

/// A named connector declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDecl {
  #[serde(rename = "type")]
  pub connector_type: String,
  /// Free-form nested mapping; string leaves may contain template
  /// expressions.
  #[serde(default = "empty_object")]
  pub configuration: Value,
}

/// One node of the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDecl {
  pub name: String,
  pub source: SourceRef,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input: Option<Value>,
  #[serde(default)]
  pub output: Vec<OutputSpec>,
  #[serde(default)]
  pub depends_on: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub on_error: Option<OnErrorPolicy>,
}

/// The three forms a step's `source` may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
  /// A reference to a declaration under `sources`.
  Named(String),
  /// A named base with a deep-merged override.
  Override {
    base: String,
    #[serde(default = "empty_object", rename = "override")]
    overlay: Value,
  },
  /// A full inline declaration.
  Inline(SourceDecl),
}

/// How one named output is projected from a connector result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
  pub name: String,
  #[serde(default)]
  pub kind: OutputKind,
  /// JSON-path expression, required for `kind: path`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
  /// Store the entire connector data under the output name.
  #[default]
  Raw,
  /// Store the projection of a JSON-path expression over the data.
  Path,
}

/// What happens to a failed step's descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
  /// Stop the whole run; skip every transitive descendant.
  #[default]
  Fail,
  /// Skip every transitive descendant, keep running the rest of the graph.
  Skip,
  /// Treat the failure as terminal for this step only; dependents still run.
  Continue,
}

/// Runner-level options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerOptions {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_workers: Option<usize>,
  /// Default policy for steps without their own `on_error`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub on_error: Option<OnErrorPolicy>,
}

fn empty_object() -> Value {
  Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_source_ref_named() {
    let step: StepDecl = serde_json::from_value(json!({
      "name": "a",
      "source": "hr_api",
    }))
    .unwrap();

    assert_eq!(step.source, SourceRef::Named("hr_api".to_string()));
    assert!(step.depends_on.is_empty());
    assert!(step.on_error.is_none());
  }

  #[test]
  fn test_source_ref_inline() {
    let step: StepDecl = serde_json::from_value(json!({
      "name": "a",
      "source": {"type": "process", "configuration": {"command": ["true"]}},
    }))
    .unwrap();

    match step.source {
      SourceRef::Inline(decl) => assert_eq!(decl.connector_type, "process"),
      other => panic!("expected inline source, got {other:?}"),
    }
  }

  #[test]
  fn test_source_ref_override() {
    let step: StepDecl = serde_json::from_value(json!({
      "name": "a",
      "source": {"base": "hr_api", "override": {"configuration": {"timeout_ms": 100}}},
    }))
    .unwrap();

    match step.source {
      SourceRef::Override { base, overlay } => {
        assert_eq!(base, "hr_api");
        assert_eq!(overlay["configuration"]["timeout_ms"], json!(100));
      }
      other => panic!("expected override source, got {other:?}"),
    }
  }

  #[test]
  fn test_output_kind_defaults_to_raw() {
    let spec: OutputSpec = serde_json::from_value(json!({"name": "data"})).unwrap();
    assert_eq!(spec.kind, OutputKind::Raw);
    assert!(spec.value.is_none());
  }

  #[test]
  fn test_on_error_parses_lowercase() {
    let step: StepDecl = serde_json::from_value(json!({
      "name": "a",
      "source": "s",
      "on_error": "skip",
    }))
    .unwrap();

    assert_eq!(step.on_error, Some(OnErrorPolicy::Skip));
  }
}
