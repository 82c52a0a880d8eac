//! Terminal reporting: live source status, per-target summaries and the
//! plugin listing/lint tables.

use std::collections::BTreeMap;
use std::sync::Mutex;

use subsweep_core::plugins::{LintRow, PluginDescriptor};
use subsweep_core::progress::ProgressSnapshot;
use subsweep_core::{ProgressRenderer, ScanResult, SourceStatus};
use tracing::{debug, info, warn};

const RULE: &str = "─────────────────────────────────────";

/// Logs each source's status transitions as they happen.
#[derive(Default)]
pub struct StatusLog {
    last: Mutex<BTreeMap<String, SourceStatus>>,
}

impl ProgressRenderer for StatusLog {
    fn render(&self, snapshot: &ProgressSnapshot) {
        let Ok(mut last) = self.last.lock() else {
            return;
        };

        for (name, entry) in snapshot {
            if last.get(name) == Some(&entry.status) {
                continue;
            }
            last.insert(name.clone(), entry.status);

            match entry.status {
                SourceStatus::Pending => {}
                SourceStatus::Running => debug!(source = %name, "Running"),
                SourceStatus::Completed | SourceStatus::Cached => {
                    info!(source = %name, found = entry.count, "{}", entry.status)
                }
                SourceStatus::Failed | SourceStatus::Timeout => {
                    warn!(source = %name, "{}", entry.status)
                }
            }
        }
    }
}

/// Contribution table for one target, largest contributor first.
pub fn summary_lines(result: &ScanResult, from_cache: bool) -> Vec<String> {
    let mut rows: Vec<(&String, &usize)> = result.contributions.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

    let mut lines = vec![
        format!(
            "  {}: {} unique subdomains{}",
            result.target,
            result.len(),
            if from_cache { " (cached)" } else { "" }
        ),
        format!("  {}", RULE),
    ];
    lines.extend(
        rows.into_iter()
            .map(|(name, count)| format!("  {:<width$}  {:>6}", name, count, width = width)),
    );
    lines
}

pub fn print_summary(result: &ScanResult, from_cache: bool) {
    eprintln!();
    for line in summary_lines(result, from_cache) {
        eprintln!("{}", line);
    }
    eprintln!();
}

pub fn print_catalog(candidates: &[PluginDescriptor], wayback_name: &str) {
    println!();
    println!("  \x1b[1;36msubsweep\x1b[0m sources");
    println!("  {}", RULE);
    for descriptor in candidates {
        println!("  {:<5} {}", descriptor.kind(), descriptor.name());
    }
    println!("  {:<5} {} (--wayback)", "api", wayback_name);
    println!();
}

pub fn print_lint(rows: &[LintRow]) {
    println!();
    for row in rows {
        let mark = if row.ok {
            "\x1b[32mOK\x1b[0m  "
        } else {
            "\x1b[31mFAIL\x1b[0m"
        };
        match &row.detail {
            Some(detail) => println!(
                "  {} {:<5} {:<20} {} ({})",
                mark, row.kind, row.plugin, row.check, detail
            ),
            None => println!("  {} {:<5} {:<20} {}", mark, row.kind, row.plugin, row.check),
        }
    }
    let failed = rows.iter().filter(|row| !row.ok).count();
    println!();
    println!("  {} checks, {} failed", rows.len(), failed);
}
