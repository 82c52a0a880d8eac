//! Target list input.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use subsweep_core::NormalizedDomain;
use tracing::warn;

/// The `-d` target, or nothing if it is not a valid domain.
pub fn from_arg(raw: &str) -> Vec<NormalizedDomain> {
    match NormalizedDomain::parse(raw) {
        Some(domain) => vec![domain],
        None => {
            warn!("Invalid target domain: '{}'", raw.trim());
            Vec::new()
        }
    }
}

/// One target per line; blank lines and `#` comments are ignored, invalid
/// lines are skipped with a warning and duplicates keep their first position.
pub fn parse_list(content: &str) -> Vec<NormalizedDomain> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match NormalizedDomain::parse(line) {
            Some(domain) => {
                if seen.insert(domain.clone()) {
                    targets.push(domain);
                }
            }
            None => warn!("Invalid domain format, skipped: '{}'", line),
        }
    }

    targets
}

pub fn from_file(path: &Path) -> Result<Vec<NormalizedDomain>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;
    Ok(parse_list(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_skips_noise_and_duplicates() {
        let targets = parse_list("# scope\nexample.com\n\n  EXAMPLE.com \nnot a domain\nbücher.de\n10.0.0.1\n");
        let names: Vec<&str> = targets.iter().map(NormalizedDomain::as_str).collect();
        assert_eq!(names, ["example.com", "xn--bcher-kva.de"]);
    }

    #[test]
    fn invalid_argument_yields_no_targets() {
        assert!(from_arg("-bad-.com").is_empty());
        assert_eq!(from_arg(" Example.org ")[0].as_str(), "example.org");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = from_file(&dir.path().join("absent.txt")).expect_err("missing file");
        assert!(err.to_string().contains("failed to read input file"));
    }
}
