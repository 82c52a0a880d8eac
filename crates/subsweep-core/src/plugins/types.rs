use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::constants::DOMAIN_PLACEHOLDER;
use crate::error::{PluginError, SourceError};

/// Raw API response handed to a parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

/// Parser output did not have the shape the plugin expects.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn unexpected(expected: &str, payload: &Payload) -> Self {
        let found = match payload {
            Payload::Json(Value::Array(_)) => "json array",
            Payload::Json(Value::Object(_)) => "json object",
            Payload::Json(_) => "json scalar",
            Payload::Text(_) => "text",
        };
        Self(format!("expected {}, got {}", expected, found))
    }
}

impl From<ParseError> for SourceError {
    fn from(err: ParseError) -> Self {
        SourceError::PluginContractViolation(err.0)
    }
}

/// Turns an API payload into candidate subdomains.
///
/// Runs on the blocking pool, so a slow parser never stalls sibling I/O.
/// Candidates are validated by the runner afterwards.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError>;
}

impl<F> ResponseParser for F
where
    F: Fn(&str, &Payload) -> Result<BTreeSet<String>, ParseError> + Send + Sync,
{
    fn parse(&self, domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
        self(domain, payload)
    }
}

/// How an API plugin authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: <value of env var>`, omitted when the variable is unset.
    Env(String),
    /// `Authorization: <token>` as given.
    Static(String),
}

impl Credential {
    pub fn header_value(&self) -> Option<String> {
        match self {
            Credential::Env(var) => std::env::var(var)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            Credential::Static(token) => Some(token.clone()),
        }
    }
}

/// External command source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPlugin {
    pub name: String,
    /// argv template; every `{domain}` is replaced with the target
    pub command: Vec<String>,
}

impl ToolPlugin {
    pub fn new<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
        }
    }

    pub fn build_command(&self, domain: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| arg.replace(DOMAIN_PLACEHOLDER, domain))
            .collect()
    }

    pub fn executable(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

/// HTTP API source.
#[derive(Clone)]
pub struct ApiPlugin {
    pub name: String,
    pub url_template: String,
    pub parser: Arc<dyn ResponseParser>,
    pub is_json: bool,
    pub credential: Option<Credential>,
    /// Overrides the scan-wide attempt budget
    pub max_attempts: Option<u32>,
}

impl ApiPlugin {
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        parser: impl ResponseParser + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            parser: Arc::new(parser),
            is_json: true,
            credential: None,
            max_attempts: None,
        }
    }

    /// Response is handed to the parser as text instead of JSON.
    pub fn text(mut self) -> Self {
        self.is_json = false;
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn build_url(&self, domain: &str) -> String {
        self.url_template.replace(DOMAIN_PLACEHOLDER, domain)
    }
}

impl fmt::Debug for ApiPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiPlugin")
            .field("name", &self.name)
            .field("url_template", &self.url_template)
            .field("is_json", &self.is_json)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// One loaded source.
#[derive(Debug, Clone)]
pub enum PluginDescriptor {
    Tool(ToolPlugin),
    Api(ApiPlugin),
}

impl PluginDescriptor {
    pub fn name(&self) -> &str {
        match self {
            PluginDescriptor::Tool(tool) => &tool.name,
            PluginDescriptor::Api(api) => &api.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PluginDescriptor::Tool(_) => "tool",
            PluginDescriptor::Api(_) => "api",
        }
    }

    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name().trim().is_empty() {
            return Err(PluginError::EmptyName);
        }
        match self {
            PluginDescriptor::Tool(tool) => {
                let has_program = tool
                    .executable()
                    .is_some_and(|program| !program.trim().is_empty());
                if !has_program {
                    return Err(PluginError::EmptyCommand(tool.name.clone()));
                }
            }
            PluginDescriptor::Api(api) => {
                if !api.url_template.contains(DOMAIN_PLACEHOLDER) {
                    return Err(PluginError::MissingPlaceholder(api.name.clone()));
                }
            }
        }
        Ok(())
    }
}

impl From<ToolPlugin> for PluginDescriptor {
    fn from(tool: ToolPlugin) -> Self {
        PluginDescriptor::Tool(tool)
    }
}

impl From<ApiPlugin> for PluginDescriptor {
    fn from(api: ApiPlugin) -> Self {
        PluginDescriptor::Api(api)
    }
}
