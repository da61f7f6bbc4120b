use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConnectorError;
use crate::result::ConnectorResult;

/// The two-method contract between the runner and any external-system
/// adapter: a constructor (held by the registry) and [`Connector::call`].
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
  /// Invoke the external system with the step's rendered input payload.
  ///
  /// Expected runtime failures are returned as a failure
  /// [`ConnectorResult`]; `Err` is reserved for programming errors and is
  /// treated by the runner as a failed step.
  async fn call(&self, input: Option<Value>) -> Result<ConnectorResult, ConnectorError>;
}
