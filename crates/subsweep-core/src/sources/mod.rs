//! Built-in source catalog.
//!
//! Shipped descriptors for the common enumeration tools and public APIs, plus
//! the built-in web archive source that `--wayback` appends to every run.

pub mod parsers;

use tracing::debug;

use crate::config::CustomTool;
use crate::constants::WAYBACK_SOURCE_NAME;
use crate::plugins::{ApiPlugin, Credential, PluginDescriptor, ToolPlugin};

pub const CHAOS_KEY_ENV: &str = "CHAOS_KEY";

const WAYBACK_CDX_URL: &str =
    "http://web.archive.org/cdx/search/cdx?url=*.{domain}/*&output=json&fl=original&collapse=urlkey";

pub fn builtin_tools() -> Vec<ToolPlugin> {
    vec![
        ToolPlugin::new("subfinder", ["subfinder", "-d", "{domain}", "-silent"]),
        ToolPlugin::new("assetfinder", ["assetfinder", "--subs-only", "{domain}"]),
        ToolPlugin::new("findomain", ["findomain", "-t", "{domain}", "-q"]),
    ]
}

pub fn builtin_apis() -> Vec<ApiPlugin> {
    let mut apis = vec![
        ApiPlugin::new(
            "crt.sh",
            "https://crt.sh/?q=%.{domain}&output=json",
            parsers::crtsh,
        ),
        ApiPlugin::new(
            "CertSpotter",
            "https://api.certspotter.com/v1/issuances?domain={domain}&include_subdomains=true&expand=dns_names",
            parsers::certspotter,
        ),
        ApiPlugin::new(
            "AlienVault OTX",
            "https://otx.alienvault.com/api/v1/indicators/domain/{domain}/passive_dns",
            parsers::alienvault,
        ),
        ApiPlugin::new(
            "HackerTarget",
            "https://api.hackertarget.com/hostsearch/?q={domain}",
            parsers::hackertarget,
        )
        .text(),
        ApiPlugin::new(
            "WaybackMachine",
            "https://web.archive.org/cdx/search/cdx?url=*.{domain}&output=json&fl=original&collapse=urlkey",
            parsers::archived_hosts,
        ),
    ];

    let chaos_key = Credential::Env(CHAOS_KEY_ENV.to_string());
    if chaos_key.header_value().is_some() {
        apis.push(
            ApiPlugin::new(
                "Chaos",
                "https://dns.projectdiscovery.io/dns/{domain}/subdomains",
                parsers::chaos,
            )
            .with_credential(chaos_key),
        );
    } else {
        debug!("{} is not set, Chaos source unavailable", CHAOS_KEY_ENV);
    }

    apis
}

/// Every shipped descriptor plus user-defined tools, in submission order:
/// tools first, then APIs.
pub fn catalog(custom_tools: &[CustomTool]) -> Vec<PluginDescriptor> {
    let custom = custom_tools
        .iter()
        .map(|tool| ToolPlugin::new(tool.name.clone(), tool.command.iter().cloned()));

    builtin_tools()
        .into_iter()
        .chain(custom)
        .map(PluginDescriptor::from)
        .chain(builtin_apis().into_iter().map(PluginDescriptor::from))
        .collect()
}

/// The built-in web archive source. Archive queries are slow, so it gets a
/// single attempt.
pub fn wayback() -> ApiPlugin {
    ApiPlugin::new(WAYBACK_SOURCE_NAME, WAYBACK_CDX_URL, parsers::wayback_cdx).with_max_attempts(1)
}
