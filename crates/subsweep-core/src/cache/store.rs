use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::lock::CacheLock;
use super::CacheKey;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::scan::ScanResult;

/// On-disk record: the serialized result and a digest of its canonical form.
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    data: Value,
    checksum: String,
}

/// SHA-256 hex digest of a canonical serialization.
pub fn checksum(canonical: &str) -> String {
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

/// Directory of fingerprinted scan results, shared between invocations.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.resolved_dir(), config.lock_timeout())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn lock_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.lock_file_name())
    }

    /// Cached result for `key`, if present and intact.
    ///
    /// Never fails: corrupt entries are logged and evicted, and an unavailable
    /// lock or unreadable file counts as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<ScanResult> {
        match self.load(key).await {
            Ok(Some(result)) => {
                debug!(path = %self.entry_path(key).display(), "Cache hit");
                Some(result)
            }
            Ok(None) => None,
            Err(err @ CacheError::Corruption { .. }) => {
                warn!("{}; entry evicted", err);
                None
            }
            Err(err) => {
                warn!("Cache read skipped: {}", err);
                None
            }
        }
    }

    async fn load(&self, key: &CacheKey) -> Result<Option<ScanResult>, CacheError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let _lock = CacheLock::acquire(&self.lock_path(key), self.lock_timeout).await?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match decode(&bytes, key) {
            Ok(result) => Ok(Some(result)),
            Err(reason) => {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), "Failed to evict corrupt cache entry: {}", err);
                }
                Err(CacheError::Corruption { path, reason })
            }
        }
    }

    /// Store `result` under `key`.
    ///
    /// The record is written to a temporary file in the cache directory and
    /// renamed over the entry, so readers see either the old or the new
    /// record.
    pub async fn put(&self, key: &CacheKey, result: &ScanResult) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let record = encode(result)?;

        let _lock = CacheLock::acquire(&self.lock_path(key), self.lock_timeout).await?;
        let dir = self.dir.clone();
        let path = self.entry_path(key);
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &record))
            .await
            .map_err(|err| CacheError::Io(std::io::Error::other(err)))??;

        debug!(path = %self.entry_path(key).display(), subdomains = result.len(), "Cached scan result");
        Ok(())
    }

    /// Remove the entry for `key` if present.
    pub async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let _lock = CacheLock::acquire(&self.lock_path(key), self.lock_timeout).await?;
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn encode(result: &ScanResult) -> Result<Vec<u8>, CacheError> {
    let data = serde_json::to_value(result)?;
    let checksum = checksum(&serde_json::to_string(&data)?);
    Ok(serde_json::to_vec(&CacheRecord { data, checksum })?)
}

fn decode(bytes: &[u8], key: &CacheKey) -> Result<ScanResult, String> {
    let record: CacheRecord =
        serde_json::from_slice(bytes).map_err(|err| format!("unreadable record: {}", err))?;

    let canonical = serde_json::to_string(&record.data)
        .map_err(|err| format!("cannot re-serialize payload: {}", err))?;
    if checksum(&canonical) != record.checksum {
        return Err("checksum mismatch".to_string());
    }

    let result: ScanResult = serde_json::from_value(record.data)
        .map_err(|err| format!("payload is not a scan result: {}", err))?;
    if result.target != *key.domain() {
        return Err(format!("entry belongs to {}", result.target));
    }
    if result.contribution_total() != result.len() {
        return Err("contributions do not match subdomains".to_string());
    }
    Ok(result)
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| CacheError::Io(err.error))?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::NormalizedDomain;
    use crate::scan::SubdomainDetail;

    fn domain(raw: &str) -> NormalizedDomain {
        NormalizedDomain::parse(raw).expect("valid domain")
    }

    fn sample() -> ScanResult {
        let mut result = ScanResult::empty(domain("example.com"));
        for (name, source) in [("a.example.com", "crt.sh"), ("b.example.com", "subfinder")] {
            result
                .subdomains
                .insert(domain(name), SubdomainDetail::default());
            *result.contributions.entry(source.to_string()).or_insert(0) += 1;
        }
        result.contributions.insert("HackerTarget".into(), 0);
        result
    }

    fn store(dir: &Path) -> CacheStore {
        CacheStore::new(dir, Duration::from_millis(100))
    }

    fn key() -> CacheKey {
        CacheKey::new(domain("example.com"), "0123abcd")
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir.path().join("cache"));

        assert!(store.get(&key()).await.is_none());
        store.put(&key(), &sample()).await.expect("put");

        let cached = store.get(&key()).await.expect("hit");
        assert_eq!(cached, sample());
        assert_eq!(
            cached.canonical_json().expect("serialize"),
            sample().canonical_json().expect("serialize")
        );
    }

    #[tokio::test]
    async fn put_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store.put(&key(), &sample()).await.expect("first put");
        store.put(&key(), &sample()).await.expect("overwrite");

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "example.com-0123abcd.json".to_string(),
                "example.com-0123abcd.json.lock".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn tampered_entry_is_evicted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store.put(&key(), &sample()).await.expect("put");

        let path = store.entry_path(&key());
        let tampered = std::fs::read_to_string(&path)
            .expect("read entry")
            .replace("a.example.com", "evil.example.com");
        std::fs::write(&path, tampered).expect("tamper");

        assert!(store.get(&key()).await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn truncated_entry_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        std::fs::write(store.entry_path(&key()), b"{\"data\": {\"tar").expect("write garbage");

        assert!(store.get(&key()).await.is_none());
        assert!(!store.entry_path(&key()).exists());
    }

    #[tokio::test]
    async fn held_lock_degrades_to_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store.put(&key(), &sample()).await.expect("put");

        let _held = CacheLock::try_acquire(&dir.path().join(key().lock_file_name()))
            .expect("open lock file")
            .expect("lock free");

        assert!(store.get(&key()).await.is_none());
        let err = store.put(&key(), &sample()).await.expect_err("lock held");
        assert!(matches!(err, CacheError::LockUnavailable(_)));
        // Contention is not corruption: the entry survives.
        assert!(store.entry_path(&key()).exists());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store.put(&key(), &sample()).await.expect("put");

        store.remove(&key()).await.expect("remove");
        store.remove(&key()).await.expect("remove again");
        assert!(store.get(&key()).await.is_none());
    }
}
