//! Environment-variable connector.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::result::ConnectorResult;

#[derive(Debug, Clone, Default, Deserialize)]
struct EnvConfig {
  #[serde(default)]
  vars: Vec<String>,
}

/// Reads a configured list of environment variables into a mapping.
/// Variables that are unset come back as `null`.
#[derive(Debug)]
pub struct EnvConnector {
  config: EnvConfig,
}

impl EnvConnector {
  pub fn new(configuration: &Value) -> Result<Self, ConnectorError> {
    let config: EnvConfig =
      serde_json::from_value(configuration.clone()).map_err(|e| ConnectorError::config(e.to_string()))?;
    Ok(Self { config })
  }
}

#[async_trait]
impl Connector for EnvConnector {
  async fn call(&self, _input: Option<Value>) -> Result<ConnectorResult, ConnectorError> {
    let mut data = serde_json::Map::new();
    for name in &self.config.vars {
      let value = match std::env::var(name) {
        Ok(v) => Value::String(v),
        Err(_) => Value::Null,
      };
      data.insert(name.clone(), value);
    }
    Ok(ConnectorResult::ok(Value::Object(data)))
  }
}
