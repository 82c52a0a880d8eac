//! Domain normalization and validation.
//!
//! Every string a source reports passes through here before it can enter a
//! merged result. Normalization trims, lowercases, strips wildcard prefixes and
//! IDNA-encodes; validation rejects IP literals, malformed labels and numeric
//! TLDs that are not Punycode.

use std::fmt;
use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Host;

const MAX_DOMAIN_LEN: usize = 253;

static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex"));

/// Clean a raw source line into its ASCII (IDNA) form.
///
/// `" *.GOOGLE.com "` becomes `"google.com"`. Returns `None` when nothing is
/// left or the host cannot be IDNA-encoded.
pub fn normalize(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_start_matches(['*', '.'])
        .trim()
        .to_lowercase();
    if cleaned.is_empty() {
        return None;
    }
    to_ascii(&cleaned)
}

fn to_ascii(host: &str) -> Option<String> {
    match Host::parse(host) {
        Ok(Host::Domain(ascii)) => Some(ascii),
        _ => None,
    }
}

/// Domain-syntax predicate applied to every member of a merged result.
pub fn is_valid_domain(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.len() > MAX_DOMAIN_LEN {
        return false;
    }

    if candidate.parse::<IpAddr>().is_ok() {
        return false;
    }

    let Some(ascii) = to_ascii(candidate) else {
        return false;
    };
    if ascii.len() > MAX_DOMAIN_LEN {
        return false;
    }

    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|label| LABEL_RE.is_match(label)) {
        return false;
    }

    let Some(tld) = labels.last() else {
        return false;
    };
    if tld.len() < 2 {
        return false;
    }

    tld.starts_with("xn--") || !tld.chars().all(|c| c.is_ascii_digit())
}

/// A lowercase, wildcard-stripped, IDNA-encoded domain that passed
/// [`is_valid_domain`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedDomain(String);

impl NormalizedDomain {
    pub fn parse(raw: &str) -> Option<Self> {
        let ascii = normalize(raw)?;
        is_valid_domain(&ascii).then_some(Self(ascii))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NormalizedDomain {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid domain: {}", value))
    }
}

impl From<NormalizedDomain> for String {
    fn from(domain: NormalizedDomain) -> Self {
        domain.0
    }
}

impl AsRef<str> for NormalizedDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_and_international_domains() {
        assert!(is_valid_domain("google.com"));
        assert!(is_valid_domain("sub.domain.co.id"));
        assert!(is_valid_domain("a-b.com"));
        assert!(is_valid_domain("example-123.net"));
        assert!(is_valid_domain("пример.рф"));
        assert!(is_valid_domain("xn--e1afmkfd.xn--p1ai"));
        assert!(is_valid_domain(
            "very-long-label-that-is-still-valid-and-not-over-63-chars.com"
        ));
    }

    #[test]
    fn rejects_malformed_domains() {
        assert!(!is_valid_domain("-invalid.com"));
        assert!(!is_valid_domain("invalid-.com"));
        assert!(!is_valid_domain("no_underscore.com"));
        assert!(!is_valid_domain("domain.c"));
        assert!(!is_valid_domain(".startwithdot.com"));
        assert!(!is_valid_domain("google..com"));
        assert!(!is_valid_domain("http://google.com"));
        assert!(!is_valid_domain("google.com/"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(64))));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("localhost"));
    }

    #[test]
    fn rejects_ip_literals_and_numeric_tlds() {
        assert!(!is_valid_domain("123.123.123.123"));
        assert!(!is_valid_domain("::1"));
        assert!(!is_valid_domain("domain.123"));
    }

    #[test]
    fn normalize_strips_wildcards_and_case() {
        assert_eq!(normalize("*.GOOGLE.com ").as_deref(), Some("google.com"));
        assert_eq!(normalize("  sub.Domain.ID").as_deref(), Some("sub.domain.id"));
        assert_eq!(normalize("*.test.net").as_deref(), Some("test.net"));
        assert_eq!(
            normalize("  *.UPPER.case.com  ").as_deref(),
            Some("upper.case.com")
        );
        assert_eq!(normalize("   "), None);
    }

    #[test]
    fn normalized_domain_is_idna_encoded() {
        let domain = NormalizedDomain::parse("Пример.РФ").expect("valid idn");
        assert_eq!(domain.as_str(), "xn--e1afmkfd.xn--p1ai");
        assert!(NormalizedDomain::parse("10.0.0.1").is_none());
    }

    #[test]
    fn normalized_domain_serializes_as_plain_string() {
        let domain = NormalizedDomain::parse("api.example.com").expect("valid");
        let json = serde_json::to_string(&domain).expect("serialize");
        assert_eq!(json, "\"api.example.com\"");

        let bad: Result<NormalizedDomain, _> = serde_json::from_str("\"bad_domain..com\"");
        assert!(bad.is_err());
    }
}
