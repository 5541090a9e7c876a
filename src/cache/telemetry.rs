//! Chunk cache telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct CacheInstruments {
    fetch_requests: Counter<u64>,
    fetch_duration_seconds: Histogram<f64>,
    fetch_keys: Histogram<u64>,
    entries: Counter<u64>,
    store_requests: Counter<u64>,
    store_bytes: Histogram<u64>,
}

fn instruments() -> &'static CacheInstruments {
    static INSTRUMENTS: OnceLock<CacheInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("chunkstore.cache");
        CacheInstruments {
            fetch_requests: meter
                .u64_counter("chunkstore.cache.fetch.requests")
                .with_description("Batched chunk fetches by outcome")
                .init(),
            fetch_duration_seconds: meter
                .f64_histogram("chunkstore.cache.fetch.duration")
                .with_description("Remote cache multi-get round trip latency")
                .with_unit("s")
                .init(),
            fetch_keys: meter
                .u64_histogram("chunkstore.cache.fetch.keys")
                .with_description("Distinct keys requested per fetch")
                .init(),
            entries: meter
                .u64_counter("chunkstore.cache.entries")
                .with_description("Per-entry fetch results (hit, miss, corrupt)")
                .init(),
            store_requests: meter
                .u64_counter("chunkstore.cache.store.requests")
                .with_description("Chunk stores by outcome")
                .init(),
            store_bytes: meter
                .u64_histogram("chunkstore.cache.store.bytes")
                .with_description("Encoded chunk size written to the cache")
                .with_unit("By")
                .init(),
        }
    })
}

pub struct FetchMetrics {
    pub backend: &'static str,
    pub outcome: &'static str,
    pub duration_seconds: f64,
    pub keys: u64,
    pub hits: u64,
    pub misses: u64,
    pub corrupt: u64,
}

pub fn record_fetch(metrics: FetchMetrics) {
    let i = instruments();
    let attrs = [
        KeyValue::new("backend", metrics.backend),
        KeyValue::new("outcome", metrics.outcome),
    ];
    i.fetch_requests.add(1, &attrs);
    i.fetch_duration_seconds.record(metrics.duration_seconds, &attrs);
    i.fetch_keys.record(metrics.keys, &attrs);

    for (result, count) in [
        ("hit", metrics.hits),
        ("miss", metrics.misses),
        ("corrupt", metrics.corrupt),
    ] {
        if count > 0 {
            i.entries.add(
                count,
                &[
                    KeyValue::new("backend", metrics.backend),
                    KeyValue::new("result", result),
                ],
            );
        }
    }
}

pub fn record_store(backend: &'static str, outcome: &'static str, bytes: usize) {
    let i = instruments();
    let attrs = [
        KeyValue::new("backend", backend),
        KeyValue::new("outcome", outcome),
    ];
    i.store_requests.add(1, &attrs);
    i.store_bytes.record(bytes as u64, &attrs);
}
