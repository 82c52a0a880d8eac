//! Merged result of one target scan.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::domain::NormalizedDomain;

/// Per-subdomain enrichment. Empty unless IP resolution ran.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubdomainDetail {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: NormalizedDomain,
    pub subdomains: BTreeMap<NormalizedDomain, SubdomainDetail>,
    /// Subdomains credited to each source; sums to `subdomains.len()`
    pub contributions: BTreeMap<String, usize>,
}

impl ScanResult {
    pub fn empty(target: NormalizedDomain) -> Self {
        Self {
            target,
            subdomains: BTreeMap::new(),
            contributions: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.subdomains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subdomains.is_empty()
    }

    /// Subdomains in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.subdomains.keys().map(NormalizedDomain::as_str)
    }

    pub fn contribution_total(&self) -> usize {
        self.contributions.values().sum()
    }

    /// Key-sorted, whitespace-free JSON; equal results always serialize to
    /// identical bytes.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_string(&value)
    }
}
