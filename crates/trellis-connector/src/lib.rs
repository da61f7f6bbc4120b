//! Connector contract and built-in connectors.
//!
//! A connector adapts one external system to the runner. Construction
//! receives the step's rendered configuration and must not perform I/O;
//! invocation returns a uniform [`ConnectorResult`]. Expected runtime
//! failures (timeouts, non-zero exits, HTTP errors) are reported inside the
//! result with `status.success = false`; an `Err` from [`Connector::call`]
//! is reserved for programming errors.
//!
//! The [`ConnectorRegistry`] maps a type tag to a constructor. Connectors
//! are instantiated lazily, only when a step actually runs.

mod connector;
mod env;
mod error;
mod http;
mod process;
mod registry;
mod result;

pub use connector::Connector;
pub use env::EnvConnector;
pub use error::ConnectorError;
pub use http::HttpConnector;
pub use process::ProcessConnector;
pub use registry::{ConnectorFactory, ConnectorRegistry};
pub use result::{ConnectorResult, ResultStatus};
