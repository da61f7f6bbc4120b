//! Templating and output extraction.
//!
//! Step inputs and source configurations may embed `{{ ... }}` expressions
//! that read prior step outputs (`flows.<step>.<output>`) and source values
//! (`sources.<name>.<key>`). Rendering is strict: an unresolved reference is
//! an error, never a silent empty string.
//!
//! Output extraction projects a connector's result data into named outputs,
//! either wholesale (`raw`) or through a JMESPath expression (`path`).

mod error;
mod extract;
mod render;

pub use error::{OutputError, TemplateError};
pub use extract::extract_outputs;
pub use render::{Renderer, TemplateContext};
