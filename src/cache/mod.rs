//! Batched chunk cache over a remote key-value cache
//!
//! Encoded chunks are stored under their external key. Fetches issue one
//! logical multi-get for a whole descriptor list and split the answer into
//! decoded hits and misses, so callers only go to the backing store for
//! what is missing:
//!
//! - a key the cache does not hold is a miss;
//! - cached bytes that fail checksum or metadata validation are a miss
//!   (logged, counted as corrupt), never a hard error for the batch;
//! - transport failures, cancellation and deadlines fail the whole call.
//!
//! The cache is an optimization, not the system of record: store failures
//! are reported to the caller, who may ignore them.

mod context;
mod memory;
mod telemetry;

pub use context::RequestContext;
pub use memory::{MemoryCache, MemoryCacheConfig};

use crate::chunk::{decode_bytes, Chunk, Descriptor};
use crate::{Error, Result};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, warn, Instrument};

/// Remote key-value cache capability.
///
/// `get_multi` returns only the keys the cache holds; absent keys are simply
/// missing from the map. Errors mean the cache could not be reached or
/// answered garbage.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>>;

    async fn set(&self, key: String, value: Bytes) -> Result<()>;

    /// Backend name for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Chunk cache configuration
#[derive(Debug, Clone)]
pub struct ChunkCacheConfig {
    /// Upper bound on each remote round trip, applied on top of the
    /// caller's own deadline
    pub request_timeout: Duration,
    /// Maximum keys per multi-get; 0 sends every key in one request
    pub batch_size: usize,
    /// Maximum concurrent multi-get requests when a fetch is split
    pub parallelism: usize,
}

impl Default for ChunkCacheConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(100),
            batch_size: 1024,
            parallelism: 16,
        }
    }
}

/// Result of looking up one descriptor.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Cached bytes decoded and validated against the descriptor
    Found(Chunk),
    /// Nothing cached under the descriptor's key
    Missing(Descriptor),
    /// Cached bytes exist but are unusable for this descriptor
    Corrupt { descriptor: Descriptor, error: Error },
}

impl FetchOutcome {
    /// Decode `cached` (if any) against `descriptor`.
    pub fn classify(descriptor: Descriptor, cached: Option<&Bytes>) -> Self {
        match cached {
            None => FetchOutcome::Missing(descriptor),
            Some(bytes) => match decode_bytes(&descriptor, bytes) {
                Ok(chunk) => FetchOutcome::Found(chunk),
                Err(error) => FetchOutcome::Corrupt { descriptor, error },
            },
        }
    }
}

/// Snapshot of cache counters since construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub fetches: u64,
    pub hits: u64,
    pub misses: u64,
    pub corrupt: u64,
    pub stores: u64,
    pub store_failures: u64,
}

#[derive(Default)]
struct CacheStatistics {
    fetches: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt: AtomicU64,
    stores: AtomicU64,
    store_failures: AtomicU64,
}

/// Chunk cache over a [`RemoteCache`] backend.
pub struct ChunkCache {
    client: Arc<dyn RemoteCache>,
    config: ChunkCacheConfig,
    stats: CacheStatistics,
}

impl ChunkCache {
    pub fn new(client: Arc<dyn RemoteCache>, config: ChunkCacheConfig) -> Self {
        Self {
            client,
            config,
            stats: CacheStatistics::default(),
        }
    }

    pub fn config(&self) -> &ChunkCacheConfig {
        &self.config
    }

    /// Store encoded chunk bytes under `key`, overwriting any previous value.
    pub async fn store_chunk(&self, ctx: &RequestContext, key: &str, buf: Bytes) -> Result<()> {
        let ctx = ctx.with_timeout(self.config.request_timeout);
        let size = buf.len();
        let backend = self.client.name();
        self.stats.stores.fetch_add(1, Ordering::Relaxed);

        match ctx.run(self.client.set(key.to_string(), buf)).await {
            Ok(()) => {
                telemetry::record_store(backend, "success", size);
                Ok(())
            }
            Err(err) => {
                self.stats.store_failures.fetch_add(1, Ordering::Relaxed);
                telemetry::record_store(backend, "error", size);
                warn!(key = %key, backend, error = %err, "Failed to store chunk in cache");
                Err(err)
            }
        }
    }

    /// Store several chunks concurrently. Every store is attempted; the
    /// first failure is returned.
    pub async fn store_chunks(
        &self,
        ctx: &RequestContext,
        keys: &[String],
        bufs: Vec<Bytes>,
    ) -> Result<()> {
        if keys.len() != bufs.len() {
            return Err(Error::Internal(format!(
                "store_chunks given {} keys but {} buffers",
                keys.len(),
                bufs.len()
            )));
        }
        let results = futures::future::join_all(
            keys.iter()
                .zip(bufs)
                .map(|(key, buf)| self.store_chunk(ctx, key, buf)),
        )
        .await;
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    /// Fetch and decode cached chunks for `descriptors`.
    ///
    /// Returns `(found, missing)`. Each descriptor lands in exactly one of
    /// the two; corrupt cache entries are reported as missing. Correlate the
    /// outputs by descriptor, not by position.
    pub async fn fetch_chunk_data(
        &self,
        ctx: &RequestContext,
        descriptors: &[Descriptor],
    ) -> Result<(Vec<Chunk>, Vec<Descriptor>)> {
        let outcomes = self.fetch_outcomes(ctx, descriptors).await?;

        let mut found = Vec::with_capacity(outcomes.len());
        let mut missing = Vec::new();
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Found(chunk) => found.push(chunk),
                FetchOutcome::Missing(descriptor) => missing.push(descriptor),
                FetchOutcome::Corrupt { descriptor, error } => {
                    warn!(
                        key = %descriptor.external_key(),
                        error = %error,
                        "Discarding unusable cached chunk"
                    );
                    missing.push(descriptor);
                }
            }
        }
        Ok((found, missing))
    }

    /// Per-descriptor outcomes, in input order.
    pub async fn fetch_outcomes(
        &self,
        ctx: &RequestContext,
        descriptors: &[Descriptor],
    ) -> Result<Vec<FetchOutcome>> {
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = descriptors.iter().map(Descriptor::external_key).collect();
        let mut seen = HashSet::with_capacity(keys.len());
        let distinct: Vec<String> = keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect();

        let backend = self.client.name();
        let span = info_span!(
            "chunk_cache.fetch",
            backend,
            descriptors = descriptors.len(),
            keys = distinct.len()
        );
        let started = Instant::now();
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);

        let ctx = ctx.with_timeout(self.config.request_timeout);
        let cached = match ctx
            .run(self.get_multi_batched(&distinct))
            .instrument(span.clone())
            .await
        {
            Ok(cached) => cached,
            Err(err) => {
                telemetry::record_fetch(telemetry::FetchMetrics {
                    backend,
                    outcome: error_class(&err),
                    duration_seconds: started.elapsed().as_secs_f64(),
                    keys: distinct.len() as u64,
                    hits: 0,
                    misses: 0,
                    corrupt: 0,
                });
                span.in_scope(|| warn!(error = %err, "Chunk cache fetch failed"));
                return Err(err);
            }
        };

        let outcomes: Vec<FetchOutcome> = descriptors
            .iter()
            .zip(&keys)
            .map(|(desc, key)| FetchOutcome::classify(desc.clone(), cached.get(key)))
            .collect();

        let (mut hits, mut misses, mut corrupt) = (0u64, 0u64, 0u64);
        for outcome in &outcomes {
            match outcome {
                FetchOutcome::Found(_) => hits += 1,
                FetchOutcome::Missing(_) => misses += 1,
                FetchOutcome::Corrupt { .. } => corrupt += 1,
            }
        }
        self.stats.hits.fetch_add(hits, Ordering::Relaxed);
        self.stats.misses.fetch_add(misses, Ordering::Relaxed);
        self.stats.corrupt.fetch_add(corrupt, Ordering::Relaxed);
        telemetry::record_fetch(telemetry::FetchMetrics {
            backend,
            outcome: "success",
            duration_seconds: started.elapsed().as_secs_f64(),
            keys: distinct.len() as u64,
            hits,
            misses,
            corrupt,
        });
        span.in_scope(|| debug!(hits, misses, corrupt, "Chunk cache fetch complete"));

        Ok(outcomes)
    }

    async fn get_multi_batched(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        let batch_size = self.config.batch_size;
        if batch_size == 0 || keys.len() <= batch_size {
            return self.client.get_multi(keys).await;
        }

        debug!(
            keys = keys.len(),
            batch_size,
            parallelism = self.config.parallelism,
            "Splitting chunk cache fetch"
        );
        stream::iter(keys.chunks(batch_size))
            .map(|batch| self.client.get_multi(batch))
            .buffer_unordered(self.config.parallelism.max(1))
            .try_fold(HashMap::with_capacity(keys.len()), |mut all, part| async move {
                all.extend(part);
                Ok(all)
            })
            .await
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            fetches: self.stats.fetches.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            corrupt: self.stats.corrupt.load(Ordering::Relaxed),
            stores: self.stats.stores.load(Ordering::Relaxed),
            store_failures: self.stats.store_failures.load(Ordering::Relaxed),
        }
    }
}

fn error_class(err: &Error) -> &'static str {
    match err {
        Error::Timeout => "timeout",
        Error::Cancelled => "cancelled",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;
    use crate::model::{Metric, SamplePair, Time, METRIC_NAME_LABEL};
    use parking_lot::Mutex;

    const USER_ID: &str = "userID";

    fn encoded_chunk(i: i64) -> (Chunk, Bytes) {
        let metric = Metric::new()
            .with_label(METRIC_NAME_LABEL, "foo")
            .with_label("bar", "baz");
        let from = Time(i * 3_600_000);
        let through = Time(from.0 + 3_600_000);
        let mut chunk = Chunk::from_samples(
            Descriptor::new(USER_ID, metric, from, through, Encoding::Delta),
            &[SamplePair::new(from, i as f64)],
        )
        .unwrap();
        let buf = chunk.encode().unwrap();
        (chunk, buf)
    }

    /// Records every multi-get batch it receives.
    #[derive(Default)]
    struct RecordingCache {
        inner: MemoryCache,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RemoteCache for RecordingCache {
        async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
            self.batches.lock().push(keys.len());
            self.inner.get_multi(keys).await
        }

        async fn set(&self, key: String, value: Bytes) -> Result<()> {
            self.inner.set(key, value).await
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn test_classify_is_total() {
        let (chunk, buf) = encoded_chunk(1);
        let desc = chunk.descriptor().clone();

        assert!(matches!(
            FetchOutcome::classify(desc.clone(), None),
            FetchOutcome::Missing(_)
        ));
        assert!(matches!(
            FetchOutcome::classify(desc.clone(), Some(&buf)),
            FetchOutcome::Found(ref c) if *c == chunk
        ));
        let garbage = Bytes::from_static(b"not a chunk");
        assert!(matches!(
            FetchOutcome::classify(desc, Some(&garbage)),
            FetchOutcome::Corrupt { error: Error::Serialization(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_fetch_skips_round_trip() {
        let client = Arc::new(RecordingCache::default());
        let cache = ChunkCache::new(client.clone(), ChunkCacheConfig::default());
        let (found, missing) = cache
            .fetch_chunk_data(&RequestContext::background(), &[])
            .await
            .unwrap();
        assert!(found.is_empty());
        assert!(missing.is_empty());
        assert!(client.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_descriptors_share_one_key() {
        let client = Arc::new(RecordingCache::default());
        let cache = ChunkCache::new(client.clone(), ChunkCacheConfig::default());
        let ctx = RequestContext::background();
        let (chunk, buf) = encoded_chunk(3);
        let key = chunk.descriptor().external_key();
        cache.store_chunk(&ctx, &key, buf).await.unwrap();

        let desc = chunk.descriptor().clone();
        let (found, missing) = cache
            .fetch_chunk_data(&ctx, &[desc.clone(), desc])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(missing.is_empty());
        assert_eq!(*client.batches.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_large_fetch_is_split_into_batches() {
        let client = Arc::new(RecordingCache::default());
        let config = ChunkCacheConfig {
            batch_size: 4,
            parallelism: 2,
            ..Default::default()
        };
        let cache = ChunkCache::new(client.clone(), config);
        let ctx = RequestContext::background();

        let mut descs = Vec::new();
        for i in 0..10 {
            let (chunk, buf) = encoded_chunk(i);
            if i % 2 == 0 {
                cache
                    .store_chunk(&ctx, &chunk.descriptor().external_key(), buf)
                    .await
                    .unwrap();
            }
            descs.push(chunk.descriptor().clone());
        }

        let (found, missing) = cache.fetch_chunk_data(&ctx, &descs).await.unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(missing.len(), 5);

        let mut batches = client.batches.lock().clone();
        batches.sort_unstable();
        assert_eq!(batches, vec![2, 4, 4]);
    }

    #[tokio::test]
    async fn test_stats_track_outcomes() {
        let cache = ChunkCache::new(Arc::new(MemoryCache::default()), ChunkCacheConfig::default());
        let ctx = RequestContext::background();
        let (stored, buf) = encoded_chunk(1);
        let (absent, _) = encoded_chunk(2);
        cache
            .store_chunk(&ctx, &stored.descriptor().external_key(), buf)
            .await
            .unwrap();

        let (wrong, _) = encoded_chunk(3);
        cache
            .store_chunk(&ctx, &wrong.descriptor().external_key(), Bytes::from_static(b"junk"))
            .await
            .unwrap();

        cache
            .fetch_chunk_data(
                &ctx,
                &[
                    stored.descriptor().clone(),
                    absent.descriptor().clone(),
                    wrong.descriptor().clone(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            cache.stats(),
            CacheStats {
                fetches: 1,
                hits: 1,
                misses: 1,
                corrupt: 1,
                stores: 2,
                store_failures: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_store_chunks_length_mismatch() {
        let cache = ChunkCache::new(Arc::new(MemoryCache::default()), ChunkCacheConfig::default());
        let err = cache
            .store_chunks(&RequestContext::background(), &["a".to_string()], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
