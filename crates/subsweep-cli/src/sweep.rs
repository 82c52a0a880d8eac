//! Multi-target driver: cache lookup, scan, enrichment, cache store, output.

use std::sync::Arc;

use anyhow::Result;
use subsweep_core::constants::VERSION;
use subsweep_core::{
    enrich, fingerprint, CacheKey, CacheStore, FeatureFlags, NormalizedDomain, Orchestrator,
    PluginSet, ProgressTracker, ScanResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{output, report};

pub struct OutputOptions {
    pub template: Option<String>,
    pub overwrite: bool,
    pub silent: bool,
}

pub struct Sweep {
    orchestrator: Orchestrator,
    plugins: PluginSet,
    cache: Option<CacheStore>,
    fingerprint: String,
    output: OutputOptions,
    cancel: CancellationToken,
}

/// Counts for the end-of-run log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub scanned: usize,
    pub cached: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl Sweep {
    pub fn new(
        orchestrator: Orchestrator,
        plugins: PluginSet,
        cache: Option<CacheStore>,
        output: OutputOptions,
        cancel: CancellationToken,
    ) -> Self {
        let flags = FeatureFlags::from_config(orchestrator.config());
        let fingerprint = fingerprint(&orchestrator.source_names(&plugins), flags, VERSION);
        Self {
            orchestrator,
            plugins,
            cache,
            fingerprint,
            output,
            cancel,
        }
    }

    /// Scan every target in order. One target's failure never stops the
    /// others; cancellation stops the loop.
    pub async fn run(&self, targets: &[NormalizedDomain]) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let multi_target = targets.len() > 1;

        for (index, target) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            info!(domain = %target, "Target {}/{}", index + 1, targets.len());

            match self.scan_target(target, multi_target).await {
                Ok(true) => summary.cached += 1,
                Ok(false) => summary.scanned += 1,
                Err(err) => {
                    summary.failed += 1;
                    error!(domain = %target, "Scan failed: {:#}", err);
                }
            }
        }

        summary.cancelled |= self.cancel.is_cancelled();
        summary
    }

    /// Returns whether the result came from cache.
    async fn scan_target(&self, target: &NormalizedDomain, multi_target: bool) -> Result<bool> {
        let key = CacheKey::new(target.clone(), self.fingerprint.as_str());

        if let Some(cache) = &self.cache {
            if let Some(result) = cache.get(&key).await {
                info!(domain = %target, "Loaded results from cache");
                let tracker = ProgressTracker::new(self.orchestrator.renderer());
                tracker.mark_cached(&result.contributions).await;
                self.deliver(&result, true, multi_target)?;
                return Ok(true);
            }
        }

        let mut result = self
            .orchestrator
            .run(target, &self.plugins, &self.cancel)
            .await?;

        if self.orchestrator.config().resolve_ip {
            enrich::resolve_ips(&mut result).await;
        }

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(&key, &result).await {
                warn!(domain = %target, "Result not cached: {}", err);
            }
        }

        self.deliver(&result, false, multi_target)?;
        Ok(false)
    }

    fn deliver(&self, result: &ScanResult, from_cache: bool, multi_target: bool) -> Result<()> {
        if !self.output.silent {
            report::print_summary(result, from_cache);
        }

        match &self.output.template {
            Some(template) => {
                let path = output::resolve_path(template, result.target.as_str(), multi_target);
                output::write(&path, result, self.output.overwrite)
            }
            None => {
                print!("{}", output::render(result, output::Format::Text)?);
                Ok(())
            }
        }
    }
}

/// Cancel `token` on Ctrl-C.
pub fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the current target");
            token.cancel();
        }
    });
}

/// Shared renderer for every target's tracker.
pub fn renderer() -> Arc<report::StatusLog> {
    Arc::new(report::StatusLog::default())
}
