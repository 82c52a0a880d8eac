//! subsweep core library
//!
//! Concurrent subdomain discovery engine:
//! - `plugins`: the two source shapes (tool subprocess, HTTP API) and their registry
//! - `runner`: per-unit execution with timeout, retry and failure containment
//! - `progress`: shared per-target status map with a render hook
//! - `orchestrator`: fan-out, deterministic merge and result capping
//! - `cache`: fingerprinted, checksum-protected, lock-guarded result cache

pub mod cache;
pub mod config;
pub mod constants;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod orchestrator;
pub mod paths;
pub mod plugins;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod scan;
pub mod sources;

#[cfg(test)]
mod test_support;

pub use cache::{fingerprint, CacheKey, CacheStore, FeatureFlags};
pub use config::{CacheConfig, ScanConfig, SweepConfig};
pub use domain::{is_valid_domain, normalize, NormalizedDomain};
pub use error::{CacheError, PluginError, ScanError, SourceError};
pub use orchestrator::Orchestrator;
pub use plugins::{ApiPlugin, Credential, PluginDescriptor, PluginSet, ToolPlugin};
pub use progress::{ProgressRenderer, ProgressTracker, SourceStatus};
pub use runner::UnitOutcome;
pub use scan::{ScanResult, SubdomainDetail};
