//! Strict template rendering over nested values.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use serde_json::Value;

use crate::error::TemplateError;

/// The two top-level names visible to expressions.
///
/// `flows` holds the extracted outputs of completed steps; `sources` the
/// materialized source view. Nothing else (filesystem, environment, network)
/// is reachable from a template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateContext {
  pub flows: BTreeMap<String, BTreeMap<String, Value>>,
  pub sources: BTreeMap<String, Value>,
}

/// Strict-mode template renderer.
///
/// An undefined identifier or missing attribute fails the render; callers
/// that want a fallback use the `default(...)` filter.
pub struct Renderer {
  env: Environment<'static>,
}

impl Default for Renderer {
  fn default() -> Self {
    Self::new()
  }
}

impl Renderer {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    Self { env }
  }

  /// Render one template string against the context.
  pub fn render_str(&self, template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    self
      .env
      .render_str(template, ctx)
      .map_err(|e| TemplateError::Render {
        template: template.to_string(),
        message: e.to_string(),
      })
  }

  /// Recursively render a nested value, rebuilding containers.
  ///
  /// Only strings that contain template syntax are touched; everything else
  /// passes through unchanged.
  pub fn render_value(&self, value: &Value, ctx: &TemplateContext) -> Result<Value, TemplateError> {
    match value {
      Value::Object(map) => {
        let mut out = serde_json::Map::with_capacity(map.len());
        for (key, item) in map {
          out.insert(key.clone(), self.render_value(item, ctx)?);
        }
        Ok(Value::Object(out))
      }
      Value::Array(items) => {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
          out.push(self.render_value(item, ctx)?);
        }
        Ok(Value::Array(out))
      }
      Value::String(s) if contains_template(s) => {
        Ok(Value::String(self.render_str(s, ctx)?))
      }
      other => Ok(other.clone()),
    }
  }
}

fn contains_template(s: &str) -> bool {
  s.contains("{{") || s.contains("{%")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn ctx_with(flows: Value, sources: Value) -> TemplateContext {
    TemplateContext {
      flows: serde_json::from_value(flows).unwrap(),
      sources: serde_json::from_value(sources).unwrap(),
    }
  }

  #[test]
  fn test_render_flow_reference() {
    let ctx = ctx_with(json!({"fetch": {"user": {"email": "a@b.c"}}}), json!({}));
    let renderer = Renderer::new();

    let out = renderer
      .render_str("{{ flows.fetch.user.email }}", &ctx)
      .unwrap();

    assert_eq!(out, "a@b.c");
  }

  #[test]
  fn test_render_without_template_is_identity() {
    let renderer = Renderer::new();
    let input = json!({
      "command": ["echo", "plain"],
      "count": 3,
      "nested": {"flag": true, "note": "no braces here"},
    });

    let out = renderer
      .render_value(&input, &TemplateContext::default())
      .unwrap();

    assert_eq!(out, input);
  }

  #[test]
  fn test_render_nested_containers() {
    let ctx = ctx_with(json!({"a": {"v": 7}}), json!({}));
    let renderer = Renderer::new();

    let out = renderer
      .render_value(
        &json!({"args": ["{{ flows.a.v }}", "literal"], "n": 1}),
        &ctx,
      )
      .unwrap();

    assert_eq!(out, json!({"args": ["7", "literal"], "n": 1}));
  }

  #[test]
  fn test_strict_undefined_reference_fails() {
    let renderer = Renderer::new();

    let err = renderer
      .render_str("{{ flows.ghost.value }}", &TemplateContext::default())
      .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("flows.ghost.value"), "got: {message}");
  }

  #[test]
  fn test_strict_missing_attribute_fails() {
    let ctx = ctx_with(json!({"x": {"present": 1}}), json!({}));
    let renderer = Renderer::new();

    let err = renderer.render_str("{{ flows.x.missing }}", &ctx).unwrap_err();

    assert!(err.to_string().contains("flows.x.missing"));
  }

  #[test]
  fn test_default_filter_provides_fallback() {
    let ctx = ctx_with(json!({"x": {}}), json!({}));
    let renderer = Renderer::new();

    let out = renderer
      .render_str("{{ flows.x.missing | default('fallback') }}", &ctx)
      .unwrap();

    assert_eq!(out, "fallback");
  }

  #[test]
  fn test_filters() {
    let ctx = ctx_with(
      json!({"a": {"name": "  Ada  ", "items": ["x", "y"], "obj": {"k": 1}}}),
      json!({}),
    );
    let renderer = Renderer::new();

    assert_eq!(
      renderer.render_str("{{ flows.a.name | trim | upper }}", &ctx).unwrap(),
      "ADA"
    );
    assert_eq!(
      renderer.render_str("{{ flows.a.items | join(',') }}", &ctx).unwrap(),
      "x,y"
    );
    assert_eq!(
      renderer.render_str("{{ flows.a.items | length }}", &ctx).unwrap(),
      "2"
    );
    assert_eq!(
      renderer.render_str("{{ flows.a.obj | tojson }}", &ctx).unwrap(),
      r#"{"k":1}"#
    );
    assert_eq!(
      renderer
        .render_str("{{ flows.a.name | trim | lower | replace('a', 'o') }}", &ctx)
        .unwrap(),
      "odo"
    );
  }

  #[test]
  fn test_inline_conditional_and_comparison() {
    let ctx = ctx_with(json!({"a": {"count": 3}}), json!({}));
    let renderer = Renderer::new();

    let out = renderer
      .render_str("{{ 'many' if flows.a.count > 2 else 'few' }}", &ctx)
      .unwrap();

    assert_eq!(out, "many");
  }

  #[test]
  fn test_string_concatenation() {
    let ctx = ctx_with(json!({"a": {"id": "42"}}), json!({}));
    let renderer = Renderer::new();

    let out = renderer
      .render_str("{{ 'user-' + flows.a.id }}", &ctx)
      .unwrap();

    assert_eq!(out, "user-42");
  }

  #[test]
  fn test_sources_are_visible() {
    let ctx = ctx_with(
      json!({}),
      json!({"env": {"type": "env", "configuration": {}, "HOME": "/root"}}),
    );
    let renderer = Renderer::new();

    let out = renderer.render_str("{{ sources.env.HOME }}", &ctx).unwrap();

    assert_eq!(out, "/root");
  }

  #[test]
  fn test_bracket_index_access() {
    let ctx = ctx_with(json!({"a": {"items": [{"id": 9}]}}), json!({}));
    let renderer = Renderer::new();

    let out = renderer
      .render_str("{{ flows.a.items[0].id }}", &ctx)
      .unwrap();

    assert_eq!(out, "9");
  }
}
