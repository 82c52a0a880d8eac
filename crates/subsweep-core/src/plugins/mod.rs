//! Source plugin contract and selection.
//!
//! A source is exactly one of two shapes: a tool subprocess or an HTTP API
//! query. Descriptors are validated once when a `PluginSet` is built; the
//! orchestrator only ever sees validated descriptors.

mod registry;
mod types;

pub use registry::{executable_available, lint, LintRow, PluginSet};
pub use types::{
    ApiPlugin, Credential, ParseError, Payload, PluginDescriptor, ResponseParser, ToolPlugin,
};
