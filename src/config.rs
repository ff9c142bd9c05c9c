//! Configuration Module
//!
//! Handles loading and managing sync-layer configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Sync-layer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// Quiet period before queued refresh requests are drained
    pub debounce_ms: u64,
    /// Namespace of the cache mirror inside the durable store
    pub cache_namespace: String,
    /// Root directory of the file-backed durable store
    pub storage_dir: PathBuf,
    /// HTTP server port
    pub server_port: u16,
    /// Queue optimistic updates that target the same entity
    pub serialize_same_entity: bool,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 500)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `DEBOUNCE_MS` - Refresh debounce window (default: 300)
    /// - `CACHE_NAMESPACE` - Mirror namespace (default: record_cache)
    /// - `STORAGE_DIR` - Durable store directory (default: ./.record_sync)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SERIALIZE_SAME_ENTITY` - Per-entity mutation queue (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl_ms: env_or("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            debounce_ms: env_or("DEBOUNCE_MS", defaults.debounce_ms),
            cache_namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.cache_namespace),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            serialize_same_entity: env_or(
                "SERIALIZE_SAME_ENTITY",
                defaults.serialize_same_entity,
            ),
        }
    }

    /// Debounce window as a Duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Default TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 500,
            default_ttl_ms: 300_000,
            sweep_interval: 60,
            debounce_ms: 300,
            cache_namespace: "record_cache".to_string(),
            storage_dir: PathBuf::from("./.record_sync"),
            server_port: 3000,
            serialize_same_entity: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 500);
        assert_eq!(config.default_ttl_ms, 300_000);
        assert_eq!(config.sweep_interval, 60);
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.cache_namespace, "record_cache");
        assert!(!config.serialize_same_entity);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MAX_ENTRIES");
        env::remove_var("DEFAULT_TTL_MS");
        env::remove_var("SWEEP_INTERVAL");
        env::remove_var("DEBOUNCE_MS");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 500);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval, 60);
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.server_port, 3000);
    }
}
