//! Scan and cache configuration
//!
//! `SweepConfig` is the on-disk TOML shape (`~/.subsweep/config.toml`); the CLI
//! layers its flags on top before handing `ScanConfig` to the orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{self, cache, scan};
use crate::paths;
use crate::retry::RetryPolicy;

/// Per-target scan behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Per-unit timeout in seconds
    pub timeout_secs: f64,
    /// Attempts per API unit
    pub api_retries: u32,
    /// First backoff delay; doubles with every attempt
    pub backoff_base_ms: u64,
    /// Optional deadline for the whole batch of one target
    pub global_timeout_secs: Option<f64>,
    /// Cap on merged subdomains; 0 disables the cap
    pub max_subdomains: usize,
    /// Enable the built-in web archive source
    pub wayback: bool,
    /// Resolve every discovered subdomain to IP addresses
    pub resolve_ip: bool,
    /// Skip TLS certificate verification
    pub insecure: bool,
    pub user_agent: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: scan::DEFAULT_TIMEOUT_SECS,
            api_retries: scan::DEFAULT_API_RETRIES,
            backoff_base_ms: scan::DEFAULT_BACKOFF_BASE_MS,
            global_timeout_secs: None,
            max_subdomains: scan::DEFAULT_MAX_SUBDOMAINS,
            wayback: false,
            resolve_ip: false,
            insecure: false,
            user_agent: constants::user_agent(),
        }
    }
}

impl ScanConfig {
    pub fn unit_timeout(&self) -> Duration {
        secs_to_duration(self.timeout_secs)
            .unwrap_or_else(|| Duration::from_secs_f64(scan::DEFAULT_TIMEOUT_SECS))
    }

    pub fn global_timeout(&self) -> Option<Duration> {
        self.global_timeout_secs.and_then(secs_to_duration)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.api_retries, Duration::from_millis(self.backoff_base_ms))
    }

    pub fn subdomain_cap(&self) -> Option<usize> {
        (self.max_subdomains > 0).then_some(self.max_subdomains)
    }
}

/// Zero, negative and non-finite values are treated as "not set".
fn secs_to_duration(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Result cache location and locking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub lock_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            lock_timeout_ms: cache::DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(paths::cache_dir)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Source selection by name (case-insensitive)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSelection {
    #[serde(rename = "use")]
    pub use_only: Vec<String>,
    pub exclude: Vec<String>,
}

/// A user-defined tool source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTool {
    pub name: String,
    /// argv; `{domain}` is replaced with the target
    pub command: Vec<String>,
}

/// Top-level config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub scan: ScanConfig,
    pub cache: CacheConfig,
    pub sources: SourceSelection,
    pub tools: Vec<CustomTool>,
}

impl SweepConfig {
    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Load `~/.subsweep/config.toml`, falling back to defaults when it is absent.
    pub fn load_default() -> Result<Self> {
        let path = paths::config_file();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }
}
