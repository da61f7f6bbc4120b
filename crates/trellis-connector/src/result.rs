//! The uniform result every connector returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured outcome of one connector invocation.
///
/// `status.success == false` marks the step failed regardless of `data`;
/// `notes` carries the human-readable detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorResult {
  pub status: ResultStatus,
  #[serde(default)]
  pub data: Value,
  #[serde(default)]
  pub meta: BTreeMap<String, Value>,
}

/// A result whose status omits `success` deserializes as a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultStatus {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub code: Option<i64>,
  #[serde(default)]
  pub notes: Vec<String>,
}

impl ConnectorResult {
  pub fn ok(data: Value) -> Self {
    Self {
      status: ResultStatus {
        success: true,
        code: Some(0),
        notes: Vec::new(),
      },
      data,
      meta: BTreeMap::new(),
    }
  }

  pub fn failure(notes: Vec<String>) -> Self {
    Self {
      status: ResultStatus {
        success: false,
        code: None,
        notes,
      },
      data: Value::Null,
      meta: BTreeMap::new(),
    }
  }

  pub fn with_code(mut self, code: i64) -> Self {
    self.status.code = Some(code);
    self
  }

  pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
    self.meta.insert(key.into(), value);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_missing_success_is_failure() {
    let result: ConnectorResult =
      serde_json::from_value(json!({"status": {}, "data": {"x": 1}, "meta": {}})).unwrap();

    assert!(!result.status.success);
  }

  #[test]
  fn test_builders() {
    let ok = ConnectorResult::ok(json!([1, 2])).with_meta("elapsed_ms", json!(12));
    assert!(ok.status.success);
    assert_eq!(ok.status.code, Some(0));
    assert_eq!(ok.meta["elapsed_ms"], json!(12));

    let failed = ConnectorResult::failure(vec!["timeout".to_string()]).with_code(124);
    assert!(!failed.status.success);
    assert_eq!(failed.status.code, Some(124));
    assert_eq!(failed.status.notes, vec!["timeout"]);
  }
}
