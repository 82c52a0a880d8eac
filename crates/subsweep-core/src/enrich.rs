//! Post-merge IP resolution.

use std::net::IpAddr;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::constants::enrich::{RESOLVE_CONCURRENCY, RESOLVE_TIMEOUT_SECS};
use crate::domain::NormalizedDomain;
use crate::scan::ScanResult;

/// Resolve every subdomain in `result` and record its addresses.
///
/// Lookups that fail or time out leave the entry's detail empty.
pub async fn resolve_ips(result: &mut ScanResult) {
    let names: Vec<NormalizedDomain> = result.subdomains.keys().cloned().collect();
    let total = names.len();
    let limit = Duration::from_secs(RESOLVE_TIMEOUT_SECS);

    let resolved: Vec<(NormalizedDomain, Vec<IpAddr>)> = stream::iter(names)
        .map(|name| async move {
            let ips = lookup(name.as_str(), limit).await;
            (name, ips)
        })
        .buffer_unordered(RESOLVE_CONCURRENCY)
        .collect()
        .await;

    let mut hits = 0usize;
    for (name, ips) in resolved {
        if ips.is_empty() {
            continue;
        }
        if let Some(detail) = result.subdomains.get_mut(&name) {
            detail.ips = ips;
            hits += 1;
        }
    }

    info!(domain = %result.target, resolved = hits, total, "IP resolution finished");
}

async fn lookup(name: &str, limit: Duration) -> Vec<IpAddr> {
    match timeout(limit, tokio::net::lookup_host((name, 0))).await {
        Ok(Ok(addrs)) => {
            let mut ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
            ips.sort();
            ips.dedup();
            ips
        }
        Ok(Err(err)) => {
            debug!(host = %name, "Lookup failed: {}", err);
            Vec::new()
        }
        Err(_) => {
            debug!(host = %name, "Lookup timed out");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::SubdomainDetail;

    #[tokio::test]
    async fn unresolvable_names_keep_empty_detail() {
        let mut result = ScanResult::empty(NormalizedDomain::parse("example.com").expect("valid"));
        result.subdomains.insert(
            NormalizedDomain::parse("nothing-here.invalid-tld-for-tests.zz").expect("valid"),
            SubdomainDetail::default(),
        );

        resolve_ips(&mut result).await;

        assert!(result.subdomains.values().all(|detail| detail.ips.is_empty()));
        let json = result.canonical_json().expect("serialize");
        assert!(!json.contains("ips"));
    }
}
