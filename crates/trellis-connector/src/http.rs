//! HTTP connector built on reqwest.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::result::{ConnectorResult, ResultStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum InputMode {
  /// Attach the payload as a query parameter named `param_name`.
  #[default]
  Parameter,
  /// Send the payload as the JSON request body.
  Body,
}

#[derive(Debug, Clone, Deserialize)]
struct HttpConfig {
  url: String,
  #[serde(default = "default_method")]
  method: String,
  #[serde(default)]
  headers: BTreeMap<String, String>,
  timeout_ms: Option<u64>,
  #[serde(default)]
  input_mode: InputMode,
  #[serde(default = "default_param_name")]
  param_name: String,
}

fn default_method() -> String {
  "GET".to_string()
}

fn default_param_name() -> String {
  "id".to_string()
}

/// Issues one HTTP request per call. 2xx responses are successes; the
/// response body is JSON-decoded with a plain-text fallback.
#[derive(Debug)]
pub struct HttpConnector {
  client: Client,
  url: Url,
  method: Method,
  headers: HeaderMap,
  input_mode: InputMode,
  param_name: String,
}

impl HttpConnector {
  pub fn new(configuration: &Value) -> Result<Self, ConnectorError> {
    let config: HttpConfig = serde_json::from_value(configuration.clone())
      .map_err(|e| ConnectorError::config(e.to_string()))?;

    let url = Url::parse(&config.url)
      .map_err(|e| ConnectorError::config(format!("invalid url '{}': {e}", config.url)))?;
    let method = Method::from_bytes(config.method.to_uppercase().as_bytes())
      .map_err(|_| ConnectorError::config(format!("invalid method '{}'", config.method)))?;

    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
      let name: HeaderName = name
        .parse()
        .map_err(|_| ConnectorError::config(format!("invalid header name '{name}'")))?;
      let value: HeaderValue = value
        .parse()
        .map_err(|_| ConnectorError::config(format!("invalid header value for '{name}'")))?;
      headers.insert(name, value);
    }

    let mut builder = Client::builder();
    if let Some(timeout_ms) = config.timeout_ms {
      builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    let client = builder
      .build()
      .map_err(|e| ConnectorError::config(e.to_string()))?;

    Ok(Self {
      client,
      url,
      method,
      headers,
      input_mode: config.input_mode,
      param_name: config.param_name,
    })
  }
}

#[async_trait]
impl Connector for HttpConnector {
  async fn call(&self, input: Option<Value>) -> Result<ConnectorResult, ConnectorError> {
    let mut request = self
      .client
      .request(self.method.clone(), self.url.clone())
      .headers(self.headers.clone());

    if let Some(payload) = input {
      match self.input_mode {
        InputMode::Parameter => {
          let value = match payload {
            Value::String(s) => s,
            other => other.to_string(),
          };
          request = request.query(&[(self.param_name.as_str(), value.as_str())]);
        }
        InputMode::Body => {
          request = request.json(&payload);
        }
      }
    }

    debug!(url = %self.url, method = %self.method, "sending request");

    let response = match request.send().await {
      Ok(response) => response,
      Err(e) => return Ok(ConnectorResult::failure(vec![e.to_string()])),
    };

    let status = response.status();
    let text = match response.text().await {
      Ok(text) => text,
      Err(e) => return Ok(ConnectorResult::failure(vec![e.to_string()])),
    };
    let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

    let success = status.is_success();
    let mut notes = Vec::new();
    if !success {
      notes.push(format!("HTTP status {}", status.as_u16()));
    }

    Ok(ConnectorResult {
      status: ResultStatus {
        success,
        code: Some(i64::from(status.as_u16())),
        notes,
      },
      data,
      meta: [(
        "status_code".to_string(),
        Value::from(status.as_u16()),
      )]
      .into_iter()
      .collect(),
    })
  }
}
