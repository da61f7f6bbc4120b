//! Explicit type-tag → constructor registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::connector::Connector;
use crate::env::EnvConnector;
use crate::error::ConnectorError;
use crate::http::HttpConnector;
use crate::process::ProcessConnector;

/// Constructor for one connector type. Receives the rendered configuration
/// and must not perform I/O.
pub type ConnectorFactory =
  Arc<dyn Fn(&Value) -> Result<Box<dyn Connector>, ConnectorError> + Send + Sync>;

/// Registry of connector constructors, populated at startup.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
  factories: BTreeMap<String, ConnectorFactory>,
}

impl ConnectorRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry pre-populated with the built-in connectors.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register("env", |config| {
      Ok(Box::new(EnvConnector::new(config)?) as Box<dyn Connector>)
    });
    registry.register("process", |config| {
      Ok(Box::new(ProcessConnector::new(config)?) as Box<dyn Connector>)
    });
    registry.register("http", |config| {
      Ok(Box::new(HttpConnector::new(config)?) as Box<dyn Connector>)
    });
    registry
  }

  /// Register a constructor under a type tag, replacing any previous one.
  pub fn register<F>(&mut self, type_tag: impl Into<String>, factory: F)
  where
    F: Fn(&Value) -> Result<Box<dyn Connector>, ConnectorError> + Send + Sync + 'static,
  {
    self.factories.insert(type_tag.into(), Arc::new(factory));
  }

  /// Instantiate a connector for a step.
  pub fn create(
    &self,
    type_tag: &str,
    configuration: &Value,
  ) -> Result<Box<dyn Connector>, ConnectorError> {
    let factory = self
      .factories
      .get(type_tag)
      .ok_or_else(|| ConnectorError::UnknownType {
        type_tag: type_tag.to_string(),
      })?;
    factory(configuration)
  }

  pub fn registered_types(&self) -> impl Iterator<Item = &str> {
    self.factories.keys().map(String::as_str)
  }
}
