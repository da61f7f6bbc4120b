use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
  /// The rendered configuration is missing or has an invalid field.
  #[error("invalid connector configuration: {message}")]
  Config { message: String },

  /// No constructor is registered for the requested type tag.
  #[error("unknown connector type '{type_tag}'")]
  UnknownType { type_tag: String },

  /// The connector itself failed in a way it could not express as a result.
  #[error("connector call failed: {message}")]
  Call { message: String },
}

impl ConnectorError {
  pub fn config(message: impl Into<String>) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  pub fn call(message: impl Into<String>) -> Self {
    Self::Call {
      message: message.into(),
    }
  }
}
