use std::collections::HashSet;

use tracing::{debug, warn};

use super::types::PluginDescriptor;
use crate::config::SourceSelection;
use crate::error::PluginError;

/// Validated sources for a run, in submission order.
///
/// Built once per process and reused for every target.
#[derive(Debug, Clone, Default)]
pub struct PluginSet {
    descriptors: Vec<PluginDescriptor>,
}

impl PluginSet {
    /// Strict constructor: every descriptor must validate and names must be unique.
    pub fn new(descriptors: Vec<PluginDescriptor>) -> Result<Self, PluginError> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            descriptor.validate()?;
            if !seen.insert(descriptor.name().to_lowercase()) {
                return Err(PluginError::Duplicate(descriptor.name().to_string()));
            }
        }
        Ok(Self { descriptors })
    }

    /// Lenient loader used by the CLI: invalid, filtered, unavailable and
    /// duplicate descriptors are logged and skipped.
    ///
    /// API plugins whose name mentions "wayback" give way to the built-in
    /// web archive source when `builtin_wayback` is set.
    pub fn select(
        candidates: Vec<PluginDescriptor>,
        selection: &SourceSelection,
        builtin_wayback: bool,
        is_available: impl Fn(&str) -> bool,
    ) -> Self {
        let use_only: HashSet<String> = selection
            .use_only
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();
        let exclude: HashSet<String> = selection
            .exclude
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();

        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();

        for descriptor in candidates {
            if let Err(err) = descriptor.validate() {
                warn!(plugin = %descriptor.name(), "Skipping invalid plugin: {}", err);
                continue;
            }

            let key = descriptor.name().to_lowercase();
            if !use_only.is_empty() && !use_only.contains(&key) {
                continue;
            }
            if exclude.contains(&key) {
                continue;
            }

            if let PluginDescriptor::Tool(tool) = &descriptor {
                let program = tool.executable().unwrap_or_default();
                if !is_available(program) {
                    warn!(
                        plugin = %tool.name,
                        "Tool '{}' is not installed, plugin skipped", program
                    );
                    continue;
                }
            }

            if builtin_wayback
                && matches!(descriptor, PluginDescriptor::Api(_))
                && key.contains("wayback")
            {
                debug!(
                    plugin = %descriptor.name(),
                    "Dropping dynamic plugin in favour of built-in web archive source"
                );
                continue;
            }

            if !seen.insert(key) {
                warn!(plugin = %descriptor.name(), "Duplicate plugin name, keeping the first");
                continue;
            }

            descriptors.push(descriptor);
        }

        Self { descriptors }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.descriptors.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .map(|descriptor| descriptor.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Whether `program` resolves on `PATH`.
pub fn executable_available(program: &str) -> bool {
    !program.is_empty() && which::which(program).is_ok()
}

/// One check in a plugin lint report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintRow {
    pub plugin: String,
    pub kind: &'static str,
    pub check: String,
    pub ok: bool,
    pub detail: Option<String>,
}

/// Validate every candidate without filtering, for `--lint-plugins`.
pub fn lint(candidates: &[PluginDescriptor], is_available: impl Fn(&str) -> bool) -> Vec<LintRow> {
    let mut rows = Vec::new();

    for descriptor in candidates {
        let plugin = descriptor.name().to_string();
        let kind = descriptor.kind();

        let validation = descriptor.validate();
        rows.push(LintRow {
            plugin: plugin.clone(),
            kind,
            check: "descriptor".to_string(),
            ok: validation.is_ok(),
            detail: validation.err().map(|err| err.to_string()),
        });

        if let PluginDescriptor::Tool(tool) = descriptor {
            let program = tool.executable().unwrap_or_default();
            let found = is_available(program);
            rows.push(LintRow {
                plugin,
                kind,
                check: format!("which({})", program),
                ok: found,
                detail: (!found).then(|| "not found on PATH".to_string()),
            });
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::plugins::{ApiPlugin, ParseError, Payload, ToolPlugin};

    fn noop(_: &str, _: &Payload) -> Result<BTreeSet<String>, ParseError> {
        Ok(BTreeSet::new())
    }

    fn candidates() -> Vec<PluginDescriptor> {
        vec![
            ToolPlugin::new("subfinder", ["subfinder", "-d", "{domain}"]).into(),
            ToolPlugin::new("missing-tool", ["missing-tool", "{domain}"]).into(),
            ApiPlugin::new("crt.sh", "https://crt.sh/?q={domain}", noop).into(),
            ApiPlugin::new("WaybackMachine", "https://web.archive.org/{domain}", noop).into(),
            ApiPlugin::new("broken", "https://no-placeholder", noop).into(),
            ApiPlugin::new("CRT.SH", "https://dup/{domain}", noop).into(),
        ]
    }

    fn available(program: &str) -> bool {
        program != "missing-tool"
    }

    #[test]
    fn select_skips_invalid_unavailable_and_duplicates() {
        let set = PluginSet::select(candidates(), &SourceSelection::default(), false, available);
        assert_eq!(set.names(), vec!["subfinder", "crt.sh", "WaybackMachine"]);
    }

    #[test]
    fn builtin_wayback_replaces_dynamic_plugin() {
        let set = PluginSet::select(candidates(), &SourceSelection::default(), true, available);
        assert_eq!(set.names(), vec!["subfinder", "crt.sh"]);
    }

    #[test]
    fn use_and_exclude_are_case_insensitive() {
        let only = SourceSelection {
            use_only: vec!["CRT.sh".into()],
            exclude: Vec::new(),
        };
        let set = PluginSet::select(candidates(), &only, false, available);
        assert_eq!(set.names(), vec!["crt.sh"]);

        let without = SourceSelection {
            use_only: Vec::new(),
            exclude: vec![" Subfinder ".into(), "waybackmachine".into()],
        };
        let set = PluginSet::select(candidates(), &without, false, available);
        assert_eq!(set.names(), vec!["crt.sh"]);
    }

    #[test]
    fn strict_constructor_rejects_duplicates() {
        let err = PluginSet::new(vec![
            ToolPlugin::new("dup", ["echo"]).into(),
            ToolPlugin::new("DUP", ["echo"]).into(),
        ])
        .expect_err("duplicate names");
        assert_eq!(err, PluginError::Duplicate("DUP".into()));
    }

    #[test]
    fn lint_reports_each_check() {
        let rows = lint(&candidates(), available);
        let failing: Vec<_> = rows
            .iter()
            .filter(|row| !row.ok)
            .map(|row| (row.plugin.as_str(), row.check.as_str()))
            .collect();
        assert_eq!(
            failing,
            vec![("missing-tool", "which(missing-tool)"), ("broken", "descriptor")]
        );
    }
}
