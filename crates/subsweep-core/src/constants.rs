//! Shared constants

/// Engine version; part of every cache fingerprint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder substituted with the target in tool arguments and API URL templates.
pub const DOMAIN_PLACEHOLDER: &str = "{domain}";

/// Progress/contribution name of the built-in web archive source.
pub const WAYBACK_SOURCE_NAME: &str = "Wayback (Built-in)";

pub mod paths {
    pub const CONFIG_DIR_NAME: &str = ".subsweep";
    pub const CONFIG_FILE_NAME: &str = "config.toml";
    pub const CACHE_DIR_NAME: &str = "cache";
}

pub mod scan {
    pub const DEFAULT_TIMEOUT_SECS: f64 = 15.0;
    pub const DEFAULT_API_RETRIES: u32 = 3;
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
    pub const DEFAULT_MAX_SUBDOMAINS: usize = 25_000;
    /// Connect timeout applied to every API request, independent of the unit timeout.
    pub const CONNECT_TIMEOUT_SECS: u64 = 5;
}

pub mod cache {
    pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 1_000;
    pub const LOCK_POLL_INTERVAL_MS: u64 = 25;
    /// Hex characters of the configuration digest kept in the cache key.
    pub const FINGERPRINT_LEN: usize = 8;
}

pub mod enrich {
    pub const RESOLVE_CONCURRENCY: usize = 50;
    pub const RESOLVE_TIMEOUT_SECS: u64 = 5;
}

/// `User-Agent` sent by API units.
pub fn user_agent() -> String {
    format!("subsweep/{}", VERSION)
}
