//! Per-target fan-out and merge.
//!
//! Every enabled source runs as one unit, all started together and joined as a
//! batch. Outcomes are merged in submission order, so the first submitted
//! source that reported a subdomain is the one credited for it, whatever order
//! the units actually finished in.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::future::join_all;
use futures::FutureExt;
use reqwest::Client;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ScanConfig;
use crate::constants::scan::CONNECT_TIMEOUT_SECS;
use crate::domain::{is_valid_domain, NormalizedDomain};
use crate::error::ScanError;
use crate::plugins::{PluginDescriptor, PluginSet};
use crate::progress::{NoopRenderer, ProgressRenderer, ProgressTracker, SourceStatus};
use crate::runner::{api, tool, UnitContext, UnitOutcome};
use crate::scan::{ScanResult, SubdomainDetail};
use crate::sources;

pub struct Orchestrator {
    config: ScanConfig,
    client: Client,
    renderer: Arc<dyn ProgressRenderer>,
    wayback: Option<PluginDescriptor>,
}

impl Orchestrator {
    /// Build the orchestrator and its shared connection pool.
    pub fn new(config: ScanConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .context("failed to build HTTP client")?;

        let wayback = config
            .wayback
            .then(|| PluginDescriptor::from(sources::wayback()));

        Ok(Self {
            config,
            client,
            renderer: Arc::new(NoopRenderer),
            wayback,
        })
    }

    /// Renderer handed to every per-target progress tracker.
    pub fn with_renderer(mut self, renderer: Arc<dyn ProgressRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn renderer(&self) -> Arc<dyn ProgressRenderer> {
        Arc::clone(&self.renderer)
    }

    fn units<'a>(&'a self, plugins: &'a PluginSet) -> Vec<&'a PluginDescriptor> {
        plugins.iter().chain(self.wayback.iter()).collect()
    }

    /// Names of every source a run would submit, in submission order.
    pub fn source_names(&self, plugins: &PluginSet) -> Vec<String> {
        self.units(plugins)
            .into_iter()
            .map(|descriptor| descriptor.name().to_string())
            .collect()
    }

    /// Scan one target with every enabled source.
    ///
    /// Source faults never surface here; only a global timeout, cancellation
    /// or an empty source list fail the target.
    pub async fn run(
        &self,
        domain: &NormalizedDomain,
        plugins: &PluginSet,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScanError> {
        let units = self.units(plugins);
        if units.is_empty() {
            return Err(ScanError::NoSources);
        }

        let names: Vec<&str> = units.iter().map(|descriptor| descriptor.name()).collect();
        let tracker = ProgressTracker::new(self.renderer());
        tracker.register(&names).await;

        info!(domain = %domain, sources = units.len(), "Starting scan");
        let started = Instant::now();

        let batch = join_all(
            units
                .iter()
                .map(|descriptor| self.contained(descriptor, domain, &tracker, cancel)),
        );

        let outcomes = match self.config.global_timeout() {
            Some(limit) => match timeout(limit, batch).await {
                Ok(outcomes) => outcomes,
                Err(_) => {
                    warn!(domain = %domain, "Global timeout of {:?} reached, discarding partial results", limit);
                    expire_unfinished(&tracker).await;
                    return Err(ScanError::GlobalTimeout(limit));
                }
            },
            None => batch.await,
        };

        if cancel.is_cancelled() {
            warn!(domain = %domain, "Scan cancelled");
            return Err(ScanError::Cancelled);
        }

        let result = merge(
            domain.clone(),
            names.iter().copied().zip(outcomes),
            self.config.subdomain_cap(),
        );

        info!(
            domain = %domain,
            subdomains = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );
        Ok(result)
    }

    /// Run one unit; a panic is contained and recorded as a failure.
    async fn contained(
        &self,
        descriptor: &PluginDescriptor,
        domain: &NormalizedDomain,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> UnitOutcome {
        let ctx = UnitContext {
            domain,
            timeout: self.config.unit_timeout(),
            progress: tracker.source(descriptor.name()),
            cancel,
        };

        let unit = async {
            match descriptor {
                PluginDescriptor::Tool(plugin) => tool::invoke(plugin, &ctx).await,
                PluginDescriptor::Api(plugin) => {
                    api::invoke(
                        &self.client,
                        plugin,
                        &ctx,
                        self.config.retry_policy(),
                        &self.config.user_agent,
                    )
                    .await
                }
            }
        };

        match AssertUnwindSafe(unit).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(source = %descriptor.name(), "Unit panicked: {}", message);
                ctx.progress.finish(0, SourceStatus::Failed).await;
                UnitOutcome::Failure(format!("panicked: {}", message))
            }
        }
    }
}

async fn expire_unfinished(tracker: &ProgressTracker) {
    for (name, entry) in tracker.snapshot().await {
        if !entry.status.is_terminal() {
            tracker.update(&name, 0, Some(SourceStatus::Timeout)).await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Merge outcomes given in submission order.
///
/// Each subdomain is credited to the first source that reported it. The set
/// is re-validated, then capped to the lexicographically first `cap` entries;
/// contributions are counted over what is kept, so they always sum to the
/// final size. Every source appears in `contributions`, failed ones with 0.
pub fn merge<'a, I>(target: NormalizedDomain, outcomes: I, cap: Option<usize>) -> ScanResult
where
    I: IntoIterator<Item = (&'a str, UnitOutcome)>,
{
    let mut credited: BTreeMap<NormalizedDomain, &'a str> = BTreeMap::new();
    let mut contributions: BTreeMap<String, usize> = BTreeMap::new();

    for (source, outcome) in outcomes {
        contributions.entry(source.to_string()).or_insert(0);
        for found in outcome.into_domains() {
            credited.entry(found).or_insert(source);
        }
    }

    credited.retain(|found, _| is_valid_domain(found.as_str()));

    if let Some(cap) = cap {
        if credited.len() > cap {
            warn!(
                domain = %target,
                found = credited.len(),
                cap,
                "Result exceeds subdomain cap, keeping the first {} in sorted order",
                cap
            );
            credited = credited.into_iter().take(cap).collect();
        }
    }

    for source in credited.values() {
        *contributions.entry((*source).to_string()).or_insert(0) += 1;
    }

    ScanResult {
        target,
        subdomains: credited
            .into_keys()
            .map(|found| (found, SubdomainDetail::default()))
            .collect(),
        contributions,
    }
}
