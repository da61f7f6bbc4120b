use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("failed to render '{template}': {message}")]
  Render { template: String, message: String },
}

#[derive(Debug, Error)]
pub enum OutputError {
  #[error("output '{output}' of step '{step}': invalid path expression '{expression}': {message}")]
  BadExpression {
    step: String,
    output: String,
    expression: String,
    message: String,
  },

  #[error("output '{output}' of step '{step}': path '{expression}' failed: {message}")]
  Evaluation {
    step: String,
    output: String,
    expression: String,
    message: String,
  },

  #[error("output '{output}' of step '{step}' has kind 'path' but no expression")]
  MissingExpression { step: String, output: String },
}
