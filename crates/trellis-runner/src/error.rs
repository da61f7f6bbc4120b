use thiserror::Error;
use trellis_connector::ConnectorError;
use trellis_template::{OutputError, TemplateError};

/// Fatal, coordinator-level failures. Per-step errors never surface here;
/// they are recorded in the step's state and drive the error-policy cascade.
#[derive(Debug, Error)]
pub enum RunnerError {
  #[error("step task aborted unexpectedly: {message}")]
  TaskAborted { message: String },
}

/// Why a single step failed. Stored on the step state as a string.
#[derive(Debug, Error)]
pub enum StepError {
  #[error(transparent)]
  Template(#[from] TemplateError),

  #[error(transparent)]
  Output(#[from] OutputError),

  #[error(transparent)]
  Connector(#[from] ConnectorError),

  #[error("{0}")]
  Failed(String),
}
