//! Document loading and deep merging.

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;

/// Read and deep-merge an ordered list of YAML documents.
///
/// Later documents override earlier ones per [`deep_merge`]. An empty
/// document contributes nothing.
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Value, ConfigError> {
  let mut merged = Value::Object(serde_json::Map::new());
  for path in paths {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let yaml: serde_yaml::Value =
      serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
      })?;
    let doc = serde_json::to_value(yaml).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    if doc.is_null() {
      continue;
    }
    merged = deep_merge(merged, doc);
  }
  Ok(merged)
}

/// Deep-merge `overlay` onto `base` and return the result.
///
/// When both sides hold an object the merge recurses per key; in every other
/// case (sequences included) the overlay value replaces the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
  match (base, overlay) {
    (Value::Object(mut base), Value::Object(overlay)) => {
      for (key, value) in overlay {
        match base.remove(&key) {
          Some(existing) => {
            base.insert(key, deep_merge(existing, value));
          }
          None => {
            base.insert(key, value);
          }
        }
      }
      Value::Object(base)
    }
    (_, overlay) => overlay,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deep_merge_recurses_into_mappings() {
    let base = json!({"a": {"x": 1, "y": 2}, "b": "keep"});
    let overlay = json!({"a": {"y": 3, "z": 4}});

    let merged = deep_merge(base, overlay);

    assert_eq!(merged, json!({"a": {"x": 1, "y": 3, "z": 4}, "b": "keep"}));
  }

  #[test]
  fn test_deep_merge_replaces_sequences() {
    let base = json!({"list": [1, 2, 3]});
    let overlay = json!({"list": [9]});

    assert_eq!(deep_merge(base, overlay), json!({"list": [9]}));
  }

  #[test]
  fn test_deep_merge_scalars_replace() {
    let base = json!({"a": 1});
    let overlay = json!({"a": "two"});

    assert_eq!(deep_merge(base, overlay), json!({"a": "two"}));
  }

  #[test]
  fn test_deep_merge_with_itself_is_identity() {
    let doc = json!({
      "sources": {"s": {"type": "env", "configuration": {"vars": ["A"]}}},
      "flow": [{"name": "a"}],
    });

    assert_eq!(deep_merge(doc.clone(), doc.clone()), doc);
  }

  #[test]
  fn test_load_documents_merges_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.yaml");
    std::fs::write(&base, "runner:\n  max_workers: 2\n  on_error: fail\n").unwrap();
    std::fs::write(&overlay, "runner:\n  max_workers: 8\n").unwrap();

    let merged = load_documents(&[&base, &overlay]).unwrap();

    assert_eq!(merged["runner"]["max_workers"], json!(8));
    assert_eq!(merged["runner"]["on_error"], json!("fail"));
  }

  #[test]
  fn test_load_documents_missing_file() {
    let result = load_documents(&["/definitely/not/here.yaml"]);
    assert!(matches!(result, Err(ConfigError::Io { .. })));
  }
}
