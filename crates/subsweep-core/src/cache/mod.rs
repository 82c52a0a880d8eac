//! Result cache.
//!
//! Entries live at `<dir>/<target>-<fingerprint>.json`. The fingerprint covers
//! the engine version, the enabled sources and every flag that changes what a
//! scan produces, so changing any of them turns old entries into misses
//! instead of serving stale data.

mod lock;
mod store;

use sha2::{Digest, Sha256};

pub use store::{checksum, CacheStore};

use crate::config::ScanConfig;
use crate::constants::cache::FINGERPRINT_LEN;
use crate::domain::NormalizedDomain;

/// Scan flags that change a result's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub wayback: bool,
    pub resolve_ip: bool,
    /// Subdomain cap; `None` keeps everything.
    pub max_subdomains: Option<usize>,
}

impl FeatureFlags {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            wayback: config.wayback,
            resolve_ip: config.resolve_ip,
            max_subdomains: config.subdomain_cap(),
        }
    }

    fn tokens(&self) -> [String; 3] {
        [
            if self.wayback { "wayback-on" } else { "wayback-off" }.to_string(),
            if self.resolve_ip { "resolve-on" } else { "resolve-off" }.to_string(),
            match self.max_subdomains {
                Some(cap) => format!("cap-{}", cap),
                None => "cap-off".to_string(),
            },
        ]
    }
}

/// Short digest of everything that shapes a scan result.
///
/// Source order does not matter; names are sorted first.
pub fn fingerprint<S: AsRef<str>>(sources: &[S], flags: FeatureFlags, version: &str) -> String {
    let mut names: Vec<&str> = sources.iter().map(|name| name.as_ref()).collect();
    names.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    for name in names {
        hasher.update(b"\x1f");
        hasher.update(name.as_bytes());
    }
    for token in flags.tokens() {
        hasher.update(b"\x1e");
        hasher.update(token.as_bytes());
    }

    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    domain: NormalizedDomain,
    fingerprint: String,
}

impl CacheKey {
    pub fn new(domain: NormalizedDomain, fingerprint: impl Into<String>) -> Self {
        Self {
            domain,
            fingerprint: fingerprint.into(),
        }
    }

    pub fn domain(&self) -> &NormalizedDomain {
        &self.domain
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.domain, self.fingerprint)
    }

    pub fn lock_file_name(&self) -> String {
        format!("{}.lock", self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VERSION;

    const SOURCES: [&str; 3] = ["subfinder", "crt.sh", "HackerTarget"];

    #[test]
    fn fingerprint_is_short_hex_and_order_independent() {
        let flags = FeatureFlags::default();
        let forward = fingerprint(&SOURCES, flags, VERSION);
        let mut reversed = SOURCES;
        reversed.reverse();

        assert_eq!(forward.len(), FINGERPRINT_LEN);
        assert!(forward.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(forward, fingerprint(&reversed, flags, VERSION));
    }

    #[test]
    fn toggling_enrichment_changes_fingerprint() {
        let plain = fingerprint(&SOURCES, FeatureFlags::default(), VERSION);
        let resolved = fingerprint(
            &SOURCES,
            FeatureFlags {
                resolve_ip: true,
                ..FeatureFlags::default()
            },
            VERSION,
        );
        assert_ne!(plain, resolved);
    }

    #[test]
    fn subdomain_cap_changes_fingerprint() {
        let capped = |cap| FeatureFlags {
            max_subdomains: cap,
            ..FeatureFlags::default()
        };
        let uncapped = fingerprint(&SOURCES, capped(None), VERSION);
        let three = fingerprint(&SOURCES, capped(Some(3)), VERSION);

        assert_ne!(uncapped, three);
        assert_ne!(three, fingerprint(&SOURCES, capped(Some(4)), VERSION));
        assert_eq!(three, fingerprint(&SOURCES, capped(Some(3)), VERSION));
    }

    #[test]
    fn flags_follow_the_scan_config() {
        let config = ScanConfig {
            max_subdomains: 0,
            resolve_ip: true,
            ..ScanConfig::default()
        };
        let flags = FeatureFlags::from_config(&config);
        assert!(flags.resolve_ip);
        assert!(!flags.wayback);
        assert_eq!(flags.max_subdomains, None);
        assert_eq!(
            FeatureFlags::from_config(&ScanConfig::default()).max_subdomains,
            Some(25_000)
        );
    }

    #[test]
    fn sources_and_version_change_fingerprint() {
        let flags = FeatureFlags::default();
        let base = fingerprint(&SOURCES, flags, VERSION);
        assert_ne!(base, fingerprint(&SOURCES[..2], flags, VERSION));
        assert_ne!(base, fingerprint(&SOURCES, flags, "0.0.0-other"));
        assert_ne!(
            fingerprint(&["ab", "c"], flags, VERSION),
            fingerprint(&["a", "bc"], flags, VERSION)
        );
    }

    #[test]
    fn key_file_names() {
        let key = CacheKey::new(
            NormalizedDomain::parse("Example.COM").expect("valid"),
            "0123abcd",
        );
        assert_eq!(key.file_name(), "example.com-0123abcd.json");
        assert_eq!(key.lock_file_name(), "example.com-0123abcd.json.lock");
    }
}
