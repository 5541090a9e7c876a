//! Uncompressed encoder: 16 bytes per sample.

use crate::model::{SamplePair, Time};
use crate::{Error, Result};

use bytes::{Buf, BufMut, Bytes, BytesMut};

const SAMPLE_LEN: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct RawChunk {
    samples: Vec<SamplePair>,
}

/// Bitwise on values, so NaN staleness markers compare equal to themselves.
impl PartialEq for RawChunk {
    fn eq(&self, other: &Self) -> bool {
        self.samples.len() == other.samples.len()
            && self
                .samples
                .iter()
                .zip(&other.samples)
                .all(|(a, b)| a.timestamp == b.timestamp && a.value.to_bits() == b.value.to_bits())
    }
}

impl RawChunk {
    pub fn new(samples: &[SamplePair]) -> Self {
        Self {
            samples: samples.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[SamplePair] {
        &self.samples
    }

    pub fn marshal(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.samples.len() * SAMPLE_LEN);
        for sample in &self.samples {
            buf.put_i64_le(sample.timestamp.0);
            buf.put_u64_le(sample.value.to_bits());
        }
        buf.freeze()
    }

    pub fn unmarshal(mut body: &[u8]) -> Result<Self> {
        if body.len() % SAMPLE_LEN != 0 {
            return Err(Error::Serialization(format!(
                "raw chunk body of {} bytes is not a multiple of {}",
                body.len(),
                SAMPLE_LEN
            )));
        }
        let mut samples = Vec::with_capacity(body.len() / SAMPLE_LEN);
        while body.has_remaining() {
            let timestamp = Time(body.get_i64_le());
            let value = f64::from_bits(body.get_u64_le());
            if let Some(prev) = samples.last().map(|s: &SamplePair| s.timestamp) {
                if timestamp < prev {
                    return Err(Error::UnsortedSamples);
                }
            }
            samples.push(SamplePair { timestamp, value });
        }
        Ok(Self { samples })
    }
}
