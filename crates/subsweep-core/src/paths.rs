//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

use crate::constants::paths;

/// Get the subsweep config directory (~/.subsweep)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(paths::CONFIG_DIR_NAME)
}

/// Get the default config file (~/.subsweep/config.toml)
pub fn config_file() -> PathBuf {
    config_dir().join(paths::CONFIG_FILE_NAME)
}

/// Get the default scan cache directory (~/.subsweep/cache)
pub fn cache_dir() -> PathBuf {
    config_dir().join(paths::CACHE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_under_config_dir() {
        let root = config_dir();
        assert!(root.ends_with(".subsweep"));
        assert_eq!(config_file(), root.join("config.toml"));
        assert_eq!(cache_dir(), root.join("cache"));
    }
}
