//! subsweep - concurrent subdomain discovery
//!
//! Fans every target out to the enabled enumeration tools and public APIs,
//! merges what they find with deterministic per-source credit, and caches
//! the result per configuration fingerprint.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use subsweep_core::constants::WAYBACK_SOURCE_NAME;
use subsweep_core::plugins::{executable_available, lint};
use subsweep_core::{sources, CacheStore, Orchestrator, PluginSet, SweepConfig};
use tokio_util::sync::CancellationToken;

mod logging;
mod output;
mod report;
mod sweep;
mod targets;

/// Exit status for a run stopped by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// subsweep - subdomain discovery across tools and public APIs
#[derive(Parser, Debug)]
#[command(name = "subsweep", version)]
#[command(about = "Concurrent subdomain discovery across enumeration tools and public APIs", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["domain", "input", "list_plugins", "lint_plugins"])
))]
struct Cli {
    /// Single target domain
    #[arg(short, long)]
    domain: Option<String>,

    /// File with one target domain per line
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Show every available source and exit
    #[arg(long)]
    list_plugins: bool,

    /// Validate every source descriptor and exit
    #[arg(long)]
    lint_plugins: bool,

    /// Only use these sources (comma separated, case-insensitive)
    #[arg(long, value_delimiter = ',', conflicts_with = "exclude_plugins")]
    use_plugins: Vec<String>,

    /// Skip these sources (comma separated, case-insensitive)
    #[arg(long, value_delimiter = ',')]
    exclude_plugins: Vec<String>,

    /// Output file; `%d` is replaced with the target. `.json` writes the full
    /// result, anything else one subdomain per line
    #[arg(short, long)]
    output: Option<String>,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Per-source timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Deadline for all sources of one target, in seconds
    #[arg(long)]
    global_timeout: Option<f64>,

    /// Cap on subdomains kept per target (0 disables the cap)
    #[arg(long)]
    max_subdomains: Option<usize>,

    /// Attempts per API source
    #[arg(long)]
    api_retries: Option<u32>,

    /// Also query the web archive (slow)
    #[arg(long)]
    wayback: bool,

    /// Resolve every discovered subdomain to IP addresses
    #[arg(long)]
    resolve_ip: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Result cache directory (default ~/.subsweep/cache)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Neither read nor write the result cache
    #[arg(long)]
    no_cache: bool,

    /// Only print warnings, errors and results
    #[arg(short, long)]
    silent: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Config file (default ~/.subsweep/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Layer command-line flags over the loaded config.
    fn apply(&self, config: &mut SweepConfig) {
        let scan = &mut config.scan;
        if let Some(timeout) = self.timeout {
            scan.timeout_secs = timeout;
        }
        if let Some(global) = self.global_timeout {
            scan.global_timeout_secs = Some(global);
        }
        if let Some(cap) = self.max_subdomains {
            scan.max_subdomains = cap;
        }
        if let Some(retries) = self.api_retries {
            scan.api_retries = retries;
        }
        scan.wayback |= self.wayback;
        scan.resolve_ip |= self.resolve_ip;
        scan.insecure |= self.insecure;

        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        if self.no_cache {
            config.cache.enabled = false;
        }

        if !self.use_plugins.is_empty() {
            config.sources.use_only = self.use_plugins.clone();
        }
        if !self.exclude_plugins.is_empty() {
            config.sources.exclude = self.exclude_plugins.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&logging::LogOptions {
        debug: cli.debug,
        silent: cli.silent,
        log_file: cli.log_file.as_deref(),
    })?;

    let mut config = match &cli.config {
        Some(path) => SweepConfig::load_from(path)?,
        None => SweepConfig::load_default()?,
    };
    cli.apply(&mut config);

    let candidates = sources::catalog(&config.tools);

    if cli.list_plugins {
        report::print_catalog(&candidates, WAYBACK_SOURCE_NAME);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.lint_plugins {
        let rows = lint(&candidates, executable_available);
        report::print_lint(&rows);
        let all_ok = rows.iter().all(|row| row.ok);
        return Ok(if all_ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let targets = match (&cli.domain, &cli.input) {
        (Some(domain), _) => targets::from_arg(domain),
        (None, Some(path)) => targets::from_file(path)?,
        (None, None) => Vec::new(),
    };
    if targets.is_empty() {
        tracing::error!("No valid target domains to scan");
        return Ok(ExitCode::FAILURE);
    }

    let plugins = PluginSet::select(
        candidates,
        &config.sources,
        config.scan.wayback,
        executable_available,
    );
    if plugins.is_empty() && !config.scan.wayback {
        tracing::error!("No sources available and --wayback is off; nothing to query");
        return Ok(ExitCode::FAILURE);
    }
    tracing::info!(sources = ?plugins.names(), wayback = config.scan.wayback, "Sources loaded");

    let orchestrator = Orchestrator::new(config.scan.clone())?.with_renderer(sweep::renderer());
    let cache = config
        .cache
        .enabled
        .then(|| CacheStore::from_config(&config.cache));

    let cancel = CancellationToken::new();
    sweep::cancel_on_interrupt(cancel.clone());

    let sweep = sweep::Sweep::new(
        orchestrator,
        plugins,
        cache,
        sweep::OutputOptions {
            template: cli.output.clone(),
            overwrite: cli.overwrite,
            silent: cli.silent,
        },
        cancel,
    );
    let summary = sweep.run(&targets).await;

    tracing::info!(
        scanned = summary.scanned,
        cached = summary.cached,
        failed = summary.failed,
        "Done"
    );

    Ok(if summary.cancelled {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    })
}
