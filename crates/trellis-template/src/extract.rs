//! Projection of connector results into named step outputs.

use std::collections::BTreeMap;

use serde_json::Value;
use trellis_config::{OutputKind, OutputSpec};

use crate::error::OutputError;

/// Evaluate a step's output specs against the connector's result data.
///
/// Specs are applied in declared order; a later spec with the same name
/// overwrites the earlier one.
pub fn extract_outputs(
  step: &str,
  data: &Value,
  specs: &[OutputSpec],
) -> Result<BTreeMap<String, Value>, OutputError> {
  let mut outputs = BTreeMap::new();
  for spec in specs {
    let value = match spec.kind {
      OutputKind::Raw => data.clone(),
      OutputKind::Path => {
        let expression = spec.value.as_deref().ok_or_else(|| {
          OutputError::MissingExpression {
            step: step.to_string(),
            output: spec.name.clone(),
          }
        })?;
        search_path(step, &spec.name, expression, data)?
      }
    };
    outputs.insert(spec.name.clone(), value);
  }
  Ok(outputs)
}

fn search_path(
  step: &str,
  output: &str,
  expression: &str,
  data: &Value,
) -> Result<Value, OutputError> {
  let compiled = jmespath::compile(expression).map_err(|e| OutputError::BadExpression {
    step: step.to_string(),
    output: output.to_string(),
    expression: expression.to_string(),
    message: e.to_string(),
  })?;
  let found = compiled
    .search(data.clone())
    .map_err(|e| OutputError::Evaluation {
      step: step.to_string(),
      output: output.to_string(),
      expression: expression.to_string(),
      message: e.to_string(),
    })?;
  serde_json::to_value(&*found).map_err(|e| OutputError::Evaluation {
    step: step.to_string(),
    output: output.to_string(),
    expression: expression.to_string(),
    message: e.to_string(),
  })
}
