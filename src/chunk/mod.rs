//! Chunks: identity, external keys, binary codec and descriptor set algebra
//!
//! A chunk is a contiguous run of samples for one series. Its
//! [`Descriptor`] names it (tenant, fingerprint, time range, checksum) and
//! formats to the external key used by caches and stores; its
//! [`ChunkData`] holds the encoder-specific samples.

mod by_key;
mod codec;
mod descriptor;
mod key;
mod matrix;

pub use by_key::{
    intersect, merge, n_way_intersect, n_way_union, sort_by_key, sort_chunks_by_key, unique,
    ByKey, DescByKey,
};
pub use codec::{decode, decode_bytes};
pub use descriptor::Descriptor;
pub use key::parse_external_key;
pub use matrix::chunks_to_matrix;

use crate::encoding::ChunkData;
use crate::model::SamplePair;
use crate::Result;

/// A descriptor plus its encoded samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    descriptor: Descriptor,
    data: ChunkData,
}

impl Chunk {
    /// The descriptor's encoding is overwritten with `data`'s.
    pub fn new(mut descriptor: Descriptor, data: ChunkData) -> Self {
        descriptor.encoding = data.encoding();
        Self { descriptor, data }
    }

    /// Encode `samples` with `descriptor.encoding`.
    pub fn from_samples(descriptor: Descriptor, samples: &[SamplePair]) -> Result<Self> {
        let data = ChunkData::new(descriptor.encoding, samples)?;
        Ok(Self { descriptor, data })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn data(&self) -> &ChunkData {
        &self.data
    }

    pub fn samples(&self) -> Result<Vec<SamplePair>> {
        self.data.samples()
    }

    pub fn into_parts(self) -> (Descriptor, ChunkData) {
        (self.descriptor, self.data)
    }
}
