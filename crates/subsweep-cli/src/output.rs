//! Result files and stdout output.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use subsweep_core::ScanResult;

const TARGET_PLACEHOLDER: &str = "%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Text,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Text,
        }
    }
}

/// Output path for one target.
///
/// `%d` is replaced with the target. Without a placeholder, multi-target runs
/// get the target appended to the file stem so results do not collide.
pub fn resolve_path(template: &str, target: &str, multi_target: bool) -> PathBuf {
    if template.contains(TARGET_PLACEHOLDER) {
        return PathBuf::from(template.replace(TARGET_PLACEHOLDER, target));
    }

    let path = PathBuf::from(template);
    if !multi_target {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, target, ext.to_string_lossy()),
        None => format!("{}-{}", stem, target),
    };
    path.with_file_name(file_name)
}

pub fn render(result: &ScanResult, format: Format) -> Result<String> {
    match format {
        Format::Json => {
            let mut json =
                serde_json::to_string_pretty(result).context("failed to serialize scan result")?;
            json.push('\n');
            Ok(json)
        }
        Format::Text => Ok(result.names().map(|name| format!("{}\n", name)).collect()),
    }
}

/// Write `result` to `path`, refusing to replace an existing file unless
/// `overwrite` is set.
pub fn write(path: &Path, result: &ScanResult, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!(
            "output file {} already exists; use --overwrite to replace it",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    let content = render(result, Format::from_path(path))?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    tracing::info!(path = %path.display(), subdomains = result.len(), "Results written");
    Ok(())
}
