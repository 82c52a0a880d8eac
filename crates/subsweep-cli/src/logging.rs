//! Tracing setup: human-readable stderr output plus an optional plain log file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub struct LogOptions<'a> {
    pub debug: bool,
    pub silent: bool,
    pub log_file: Option<&'a Path>,
}

impl LogOptions<'_> {
    fn default_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.silent {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

/// Install the global subscriber. `RUST_LOG` directives refine the default
/// level picked from `--debug` / `--silent`.
pub fn init(options: &LogOptions<'_>) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(options.default_level().into())
        .from_env_lossy();

    let file_layer = match options.log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_wins_over_silent() {
        let options = LogOptions {
            debug: true,
            silent: true,
            log_file: None,
        };
        assert_eq!(options.default_level(), Level::DEBUG);

        let quiet = LogOptions {
            debug: false,
            silent: true,
            log_file: None,
        };
        assert_eq!(quiet.default_level(), Level::WARN);
    }

    #[test]
    fn silent_still_shows_cache_warnings() {
        let quiet = LogOptions {
            debug: false,
            silent: true,
            log_file: None,
        };
        assert!(Level::WARN <= quiet.default_level());
        assert!(Level::INFO > quiet.default_level());
    }
}
