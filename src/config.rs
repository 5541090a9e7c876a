//! Component factory for environment-based configuration
//!
//! Environment variables:
//! - CHUNKSTORE_TENANT_ID: tenant for keys (default: default)
//! - CHUNKSTORE_ENCODING: encoder for new chunks, "raw" or "delta" (default: delta)
//! - CHUNK_CACHE_BACKEND: "memory" (default)
//! - CHUNK_CACHE_TIMEOUT_MS: per round trip timeout (default: 100)
//! - CHUNK_CACHE_BATCH_SIZE: keys per multi-get, 0 = unbounded (default: 1024)
//! - CHUNK_CACHE_PARALLELISM: concurrent multi-gets (default: 16)
//! - CHUNK_CACHE_CAPACITY_MB: in-memory backend capacity (default: 256)
//! - CHUNK_CACHE_TTL_SECS: in-memory backend TTL, 0 = none (default: 0)
//!
//! Every `from_env` has a `from_lookup` twin taking the variable source
//! explicitly.

use crate::cache::{ChunkCache, ChunkCacheConfig, MemoryCache, MemoryCacheConfig, RemoteCache};
use crate::encoding::Encoding;
use crate::{Config, Error, Result};

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_var<T, L>(lookup: &L, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{name} has invalid value '{raw}': {e}")))
}

impl ChunkCacheConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CHUNK_CACHE_TIMEOUT_MS")? {
            if ms == 0 {
                return Err(Error::Config(
                    "CHUNK_CACHE_TIMEOUT_MS must be greater than 0".to_string(),
                ));
            }
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(batch_size) = parse_var(&lookup, "CHUNK_CACHE_BATCH_SIZE")? {
            config.batch_size = batch_size;
        }
        if let Some(parallelism) = parse_var::<usize, _>(&lookup, "CHUNK_CACHE_PARALLELISM")? {
            if parallelism == 0 {
                return Err(Error::Config(
                    "CHUNK_CACHE_PARALLELISM must be greater than 0".to_string(),
                ));
            }
            config.parallelism = parallelism;
        }
        Ok(config)
    }
}

impl MemoryCacheConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(mb) = parse_var::<u64, _>(&lookup, "CHUNK_CACHE_CAPACITY_MB")? {
            config.capacity_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CHUNK_CACHE_TTL_SECS")? {
            config.ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self {
            cache: ChunkCacheConfig::from_lookup(&lookup)?,
            ..Self::default()
        };
        if let Some(tenant_id) = lookup("CHUNKSTORE_TENANT_ID") {
            let tenant_id = tenant_id.trim();
            if tenant_id.is_empty() || tenant_id.contains('/') {
                return Err(Error::Config(format!(
                    "CHUNKSTORE_TENANT_ID '{tenant_id}' must be non-empty and must not contain '/'"
                )));
            }
            config.tenant_id = tenant_id.to_string();
        }
        if let Some(encoding) = parse_var::<Encoding, _>(&lookup, "CHUNKSTORE_ENCODING")? {
            config.default_encoding = encoding;
        }
        Ok(config)
    }
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create the remote cache backend named by CHUNK_CACHE_BACKEND.
    pub fn create_remote_cache() -> Result<Arc<dyn RemoteCache>> {
        Self::create_remote_cache_from(env_lookup)
    }

    pub fn create_remote_cache_from(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Arc<dyn RemoteCache>> {
        let backend = lookup("CHUNK_CACHE_BACKEND").unwrap_or_else(|| "memory".to_string());

        match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => {
                let config = MemoryCacheConfig::from_lookup(&lookup)?;
                info!(
                    capacity_bytes = config.capacity_bytes,
                    ttl_secs = config.ttl.map(|ttl| ttl.as_secs()).unwrap_or(0),
                    "Using in-memory chunk cache"
                );
                Ok(Arc::new(MemoryCache::new(config)))
            }
            other => Err(Error::Config(format!(
                "Unknown CHUNK_CACHE_BACKEND: {}. Use 'memory'",
                other
            ))),
        }
    }

    /// Create a chunk cache over the configured backend.
    pub fn create_chunk_cache(config: &Config) -> Result<ChunkCache> {
        Self::create_chunk_cache_from(env_lookup, config)
    }

    pub fn create_chunk_cache_from(
        lookup: impl Fn(&str) -> Option<String>,
        config: &Config,
    ) -> Result<ChunkCache> {
        let client = Self::create_remote_cache_from(lookup)?;
        Ok(ChunkCache::new(client, config.cache.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.tenant_id, "default");
        assert_eq!(config.default_encoding, Encoding::Delta);
        assert_eq!(config.cache.request_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CHUNKSTORE_TENANT_ID", "team-a"),
            ("CHUNKSTORE_ENCODING", "raw"),
            ("CHUNK_CACHE_TIMEOUT_MS", "250"),
            ("CHUNK_CACHE_BATCH_SIZE", "0"),
            ("CHUNK_CACHE_PARALLELISM", "4"),
        ]))
        .unwrap();
        assert_eq!(config.tenant_id, "team-a");
        assert_eq!(config.default_encoding, Encoding::Raw);
        assert_eq!(config.cache.request_timeout, Duration::from_millis(250));
        assert_eq!(config.cache.batch_size, 0);
        assert_eq!(config.cache.parallelism, 4);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for vars in [
            [("CHUNK_CACHE_TIMEOUT_MS", "abc")],
            [("CHUNK_CACHE_TIMEOUT_MS", "0")],
            [("CHUNK_CACHE_PARALLELISM", "0")],
            [("CHUNKSTORE_TENANT_ID", "a/b")],
            [("CHUNKSTORE_ENCODING", "gorilla")],
        ] {
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{vars:?}: {err}");
        }
    }

    #[test]
    fn test_memory_cache_config() {
        let config = MemoryCacheConfig::from_lookup(lookup(&[
            ("CHUNK_CACHE_CAPACITY_MB", "2"),
            ("CHUNK_CACHE_TTL_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.capacity_bytes, 2 * 1024 * 1024);
        assert_eq!(config.ttl, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_unknown_backend() {
        let result = ComponentFactory::create_remote_cache_from(lookup(&[(
            "CHUNK_CACHE_BACKEND",
            "memcached",
        )]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_chunk_cache_from_lookup() {
        let vars = lookup(&[("CHUNK_CACHE_BATCH_SIZE", "8")]);
        let config = Config::from_lookup(&vars).unwrap();
        let cache = ComponentFactory::create_chunk_cache_from(&vars, &config).unwrap();
        assert_eq!(cache.config().batch_size, 8);

        let result = ComponentFactory::create_chunk_cache_from(
            lookup(&[("CHUNK_CACHE_BACKEND", "redis")]),
            &config,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_memory_backend() {
        let cache = ComponentFactory::create_remote_cache_from(lookup(&[])).unwrap();
        assert_eq!(cache.name(), "memory");
    }
}
