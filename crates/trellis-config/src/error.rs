use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("invalid configuration: {message}")]
  Invalid { message: String },

  #[error("step '{step}' references unknown source '{source_name}'")]
  UnknownSource { step: String, source_name: String },
}
