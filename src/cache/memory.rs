//! In-process remote cache backend
//!
//! Backed by moka with a byte-weighted capacity and optional TTL. Used in
//! development and tests in place of a networked cache, and as a drop-in
//! for single-node deployments.

use super::RemoteCache;
use crate::Result;

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use std::collections::HashMap;
use std::time::Duration;

/// In-memory cache configuration
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum weighted size (key + value bytes)
    pub capacity_bytes: u64,
    /// Time-to-live for entries; `None` keeps them until evicted
    pub ttl: Option<Duration>,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 256 * 1024 * 1024, // 256MB
            ttl: None,
        }
    }
}

pub struct MemoryCache {
    inner: Cache<String, Bytes>,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.capacity_bytes)
            .weigher(|key: &String, value: &Bytes| {
                u32::try_from(key.len() + value.len()).unwrap_or(u32::MAX)
            });
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    pub fn weighted_size(&self) -> u64 {
        self.inner.weighted_size()
    }

    /// Apply pending evictions and size accounting.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    pub async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

#[async_trait]
impl RemoteCache for MemoryCache {
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.inner.get(key).await {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    async fn set(&self, key: String, value: Bytes) -> Result<()> {
        self.inner.insert(key, value).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
