//! # chunkstore
//!
//! Chunk storage layer for a multi-tenant time-series database.
//!
//! A chunk is a contiguous run of samples for one series. This crate covers
//! how chunks are named, serialized, cached and combined:
//!
//! - **Chunk identity**: [`chunk::Descriptor`] and its versioned external key
//!   ([`chunk::parse_external_key`])
//! - **Chunk codec**: a self-describing, CRC32-protected binary format
//!   ([`chunk::Chunk::encode`], [`chunk::decode`]) around pluggable sample
//!   encoders ([`encoding::Encoding`])
//! - **Descriptor set algebra**: dedupe, union and intersection of sorted
//!   descriptor lists from independent index lookups
//!   ([`chunk::n_way_union`], [`chunk::n_way_intersect`])
//! - **Chunk cache**: batched fetch/store of encoded chunks against a remote
//!   cache with explicit hit/miss reporting ([`cache::ChunkCache`])
//!
//! The backing store, the label index and the query engine are external
//! collaborators.

pub mod cache;
pub mod chunk;
pub mod config;
pub mod encoding;
pub mod model;
pub mod telemetry;

mod error;

pub use error::{Error, Result};

/// Configuration for a chunkstore client
#[derive(Debug, Clone)]
pub struct Config {
    /// Tenant whose keys this client reads and writes
    pub tenant_id: String,
    /// Remote cache behaviour
    pub cache: cache::ChunkCacheConfig,
    /// Encoder for newly built chunks
    pub default_encoding: encoding::Encoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant_id: "default".to_string(),
            cache: cache::ChunkCacheConfig::default(),
            default_encoding: encoding::Encoding::default(),
        }
    }
}

/// Re-exports for convenience
pub mod prelude {
    pub use crate::cache::{
        ChunkCache, ChunkCacheConfig, FetchOutcome, MemoryCache, RemoteCache, RequestContext,
    };
    pub use crate::chunk::{
        decode, n_way_intersect, n_way_union, parse_external_key, Chunk, DescByKey, Descriptor,
    };
    pub use crate::encoding::{ChunkData, Encoding};
    pub use crate::model::{Fingerprint, Metric, SamplePair, Time};
    pub use crate::{Config, Error, Result};
}
