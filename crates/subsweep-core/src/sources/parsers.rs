//! Response parsers for the built-in API sources.
//!
//! Parsers only extract candidates; normalization and validation happen in
//! the runner.

use std::collections::BTreeSet;

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::plugins::{ParseError, Payload};

fn json_array(payload: &Payload) -> Result<&Vec<Value>, ParseError> {
    match payload {
        Payload::Json(Value::Array(items)) => Ok(items),
        other => Err(ParseError::unexpected("json array", other)),
    }
}

fn json_object(payload: &Payload) -> Result<&serde_json::Map<String, Value>, ParseError> {
    match payload {
        Payload::Json(Value::Object(map)) => Ok(map),
        other => Err(ParseError::unexpected("json object", other)),
    }
}

/// crt.sh: `[{"name_value": "a.example.com\nb.example.com"}, ...]`
pub fn crtsh(_domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
    Ok(json_array(payload)?
        .iter()
        .filter_map(|entry| entry.get("name_value").and_then(Value::as_str))
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect())
}

/// CertSpotter: `[{"dns_names": ["a.example.com", ...]}, ...]`
pub fn certspotter(_domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
    Ok(json_array(payload)?
        .iter()
        .filter_map(|issuance| issuance.get("dns_names").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

/// AlienVault OTX: `{"passive_dns": [{"hostname": "..."}, ...]}`
pub fn alienvault(_domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
    let Some(records) = json_object(payload)?
        .get("passive_dns")
        .and_then(Value::as_array)
    else {
        return Ok(BTreeSet::new());
    };

    Ok(records
        .iter()
        .filter_map(|record| record.get("hostname").and_then(Value::as_str))
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect())
}

/// HackerTarget: plain text, one `host,ip` per line.
pub fn hackertarget(_domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
    let Payload::Text(body) = payload else {
        return Err(ParseError::unexpected("text", payload));
    };

    Ok(body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| line.split(',').next())
        .map(|host| host.trim().to_string())
        .collect())
}

/// Chaos: `{"domain": "example.com", "subdomains": ["a", "b"]}`
pub fn chaos(domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
    let map = json_object(payload)?;
    let Some(subdomains) = map.get("subdomains").and_then(Value::as_array) else {
        return Err(ParseError("chaos response has no 'subdomains' list".to_string()));
    };
    let apex = map.get("domain").and_then(Value::as_str).unwrap_or(domain);

    Ok(subdomains
        .iter()
        .filter_map(Value::as_str)
        .map(|label| format!("{}.{}", label, apex))
        .collect())
}

/// Web archive CDX rows (`[["original"], ["http://a.example.com/x"], ...]`),
/// taking the host of every archived URL.
pub fn archived_hosts(_domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
    Ok(json_array(payload)?
        .iter()
        .filter_map(|row| row.as_array().and_then(|row| row.first()))
        .filter_map(Value::as_str)
        .filter_map(|raw| Url::parse(raw).ok())
        .filter_map(|url| url.host_str().map(str::to_string))
        .collect())
}

/// Built-in web archive source: skips the CDX header row and keeps hosts that
/// end in the target.
pub fn wayback_cdx(domain: &str, payload: &Payload) -> Result<BTreeSet<String>, ParseError> {
    let rows = json_array(payload)?;
    let pattern = Regex::new(&format!(
        r"^https?://(?:www\.)?([a-zA-Z0-9.-]+\.{})",
        regex::escape(domain)
    ))
    .map_err(|err| ParseError(format!("invalid host pattern: {}", err)))?;

    Ok(rows
        .iter()
        .skip(1)
        .filter_map(|row| row.as_array().and_then(|row| row.first()))
        .filter_map(Value::as_str)
        .filter_map(|raw| pattern.captures(raw))
        .filter_map(|caps| caps.get(1))
        .map(|host| host.as_str().to_string())
        .collect())
}
