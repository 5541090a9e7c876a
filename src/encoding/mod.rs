//! Sample encoders for chunk payloads
//!
//! The set of encoders is closed: every chunk carries a one-byte
//! [`Encoding`] tag and [`ChunkData`] dispatches on it with an exhaustive
//! match. The chunk codec treats the marshalled output as an opaque body.

mod delta;
mod raw;
mod varint;

pub use delta::DeltaChunk;
pub use raw::RawChunk;

use crate::model::SamplePair;
use crate::{Error, Result};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding tag stored in every encoded chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Encoding {
    /// Fixed-width `(timestamp, value)` records
    Raw = 1,
    /// Varint timestamp deltas and XOR-ed value bits
    #[default]
    Delta = 2,
}

impl Encoding {
    pub fn tag(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Raw => "raw",
            Encoding::Delta => "delta",
        }
    }
}

impl TryFrom<u8> for Encoding {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Encoding::Raw),
            2 => Ok(Encoding::Delta),
            other => Err(Error::UnknownEncoding(other)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Encoding::Raw),
            "delta" => Ok(Encoding::Delta),
            other => Err(Error::Config(format!(
                "unknown chunk encoding '{}'; expected one of raw, delta",
                other
            ))),
        }
    }
}

/// Encoder-specific in-memory representation of a chunk's samples.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkData {
    Raw(RawChunk),
    Delta(DeltaChunk),
}

impl ChunkData {
    /// Encode `samples` with the given encoder. Samples must be sorted by
    /// timestamp.
    pub fn new(encoding: Encoding, samples: &[SamplePair]) -> Result<Self> {
        if samples
            .windows(2)
            .any(|w| w[0].timestamp > w[1].timestamp)
        {
            return Err(Error::UnsortedSamples);
        }
        Ok(match encoding {
            Encoding::Raw => ChunkData::Raw(RawChunk::new(samples)),
            Encoding::Delta => ChunkData::Delta(DeltaChunk::new(samples)),
        })
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            ChunkData::Raw(_) => Encoding::Raw,
            ChunkData::Delta(_) => Encoding::Delta,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChunkData::Raw(c) => c.len(),
            ChunkData::Delta(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples(&self) -> Result<Vec<SamplePair>> {
        match self {
            ChunkData::Raw(c) => Ok(c.samples().to_vec()),
            ChunkData::Delta(c) => c.samples(),
        }
    }

    /// Opaque body bytes for the chunk codec.
    pub fn marshal(&self) -> Bytes {
        match self {
            ChunkData::Raw(c) => c.marshal(),
            ChunkData::Delta(c) => c.marshal(),
        }
    }

    pub fn unmarshal(encoding: Encoding, body: &[u8]) -> Result<Self> {
        match encoding {
            Encoding::Raw => RawChunk::unmarshal(body).map(ChunkData::Raw),
            Encoding::Delta => DeltaChunk::unmarshal(body).map(ChunkData::Delta),
        }
    }
}
