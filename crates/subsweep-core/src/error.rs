//! Error taxonomy.
//!
//! Source-level errors never escape a unit runner; they are logged and folded
//! into a [`UnitOutcome`](crate::runner::UnitOutcome). Cache errors degrade to
//! a cache miss. Only [`ScanError`] reaches the target loop.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single source unit.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("plugin contract violation: {0}")]
    PluginContractViolation(String),
    #[error("tool exited with code {code}: {stderr}")]
    ToolExecution { code: i32, stderr: String },
    #[error("executable '{0}' not found on PATH")]
    ExecutableNotFound(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Errors an API unit retries after backing off.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::PluginContractViolation(_) | Self::Timeout(_)
        )
    }

    /// Whether this failure should be reported as a timeout rather than a failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Transport(err) => err.is_timeout(),
            _ => false,
        }
    }
}

/// Invalid plugin descriptor rejected at the loading boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("plugin name cannot be empty")]
    EmptyName,
    #[error("tool plugin '{0}' has an empty command")]
    EmptyCommand(String),
    #[error("api plugin '{0}' url template has no {{domain}} placeholder")]
    MissingPlaceholder(String),
    #[error("duplicate plugin name '{0}'")]
    Duplicate(String),
}

/// Cache read/write failure. Callers treat every variant as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry {path} is corrupt: {reason}")]
    Corruption { path: PathBuf, reason: String },
    #[error("could not acquire cache lock {0} in time")]
    LockUnavailable(PathBuf),
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Target-level failure surfaced to the driver loop.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan exceeded global timeout of {0:?}")]
    GlobalTimeout(Duration),
    #[error("scan cancelled")]
    Cancelled,
    #[error("no sources enabled")]
    NoSources,
}
