//! Delta encoder.
//!
//! Layout: `count` varint, then for the first sample the zigzag timestamp and
//! the raw value bits, then for each following sample the timestamp delta
//! and the value bits XOR-ed with the previous value. Series with regular
//! scrape intervals and slowly moving values compress to a few bytes per
//! sample.

use super::varint::{put_uvarint, put_varint, read_uvarint, read_varint};
use crate::model::{SamplePair, Time};
use crate::{Error, Result};

use bytes::{Bytes, BytesMut};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaChunk {
    count: usize,
    body: Bytes,
}

impl DeltaChunk {
    pub fn new(samples: &[SamplePair]) -> Self {
        let mut buf = BytesMut::with_capacity(samples.len() * 4 + 10);
        put_uvarint(&mut buf, samples.len() as u64);

        let mut prev: Option<SamplePair> = None;
        for sample in samples {
            match prev {
                None => {
                    put_varint(&mut buf, sample.timestamp.0);
                    put_uvarint(&mut buf, sample.value.to_bits());
                }
                Some(p) => {
                    let delta = sample.timestamp.0.wrapping_sub(p.timestamp.0) as u64;
                    put_uvarint(&mut buf, delta);
                    put_uvarint(&mut buf, sample.value.to_bits() ^ p.value.to_bits());
                }
            }
            prev = Some(*sample);
        }

        Self {
            count: samples.len(),
            body: buf.freeze(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn samples(&self) -> Result<Vec<SamplePair>> {
        let (samples, _) = decode_body(&self.body)?;
        Ok(samples)
    }

    pub fn marshal(&self) -> Bytes {
        self.body.clone()
    }

    /// Validates the whole body up front so a corrupt payload fails here
    /// rather than on first read.
    pub fn unmarshal(body: &[u8]) -> Result<Self> {
        let (samples, consumed) = decode_body(body)?;
        if consumed != body.len() {
            return Err(Error::Serialization(format!(
                "delta chunk has {} trailing bytes",
                body.len() - consumed
            )));
        }
        Ok(Self {
            count: samples.len(),
            body: Bytes::copy_from_slice(body),
        })
    }
}

fn decode_body(body: &[u8]) -> Result<(Vec<SamplePair>, usize)> {
    let mut pos = 0;
    let count = read_uvarint(body, &mut pos)? as usize;
    // every sample takes at least two bytes
    if count > body.len() {
        return Err(Error::Serialization(format!(
            "delta chunk claims {} samples in {} bytes",
            count,
            body.len()
        )));
    }

    let mut samples = Vec::with_capacity(count);
    let mut prev: Option<SamplePair> = None;
    for _ in 0..count {
        let sample = match prev {
            None => {
                let ts = read_varint(body, &mut pos)?;
                let bits = read_uvarint(body, &mut pos)?;
                SamplePair::new(Time(ts), f64::from_bits(bits))
            }
            Some(p) => {
                // Deltas are unsigned and may exceed i64::MAX for chunks
                // spanning most of the timestamp range
                let delta = read_uvarint(body, &mut pos)?;
                let ts = p.timestamp.0.wrapping_add(delta as i64);
                if ts < p.timestamp.0 {
                    return Err(Error::UnsortedSamples);
                }
                let bits = read_uvarint(body, &mut pos)? ^ p.value.to_bits();
                SamplePair::new(Time(ts), f64::from_bits(bits))
            }
        };
        samples.push(sample);
        prev = Some(sample);
    }
    Ok((samples, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_series_is_compact() {
        let samples: Vec<SamplePair> = (0..120)
            .map(|i| SamplePair::new(Time(1_700_000_000_000 + i * 15_000), 1.0))
            .collect();
        let chunk = DeltaChunk::new(&samples);
        // 16 bytes/sample raw; constant values and fixed deltas need ~4
        assert!(chunk.marshal().len() < samples.len() * 5);
        assert_eq!(chunk.samples().unwrap(), samples);
    }

    #[test]
    fn test_full_timestamp_range() {
        let samples = vec![
            SamplePair::new(Time(i64::MIN), 1.0),
            SamplePair::new(Time(0), 2.0),
            SamplePair::new(Time(i64::MAX), 3.0),
        ];
        let chunk = DeltaChunk::new(&samples);
        let decoded = DeltaChunk::unmarshal(&chunk.marshal()).unwrap();
        assert_eq!(decoded.samples().unwrap(), samples);

        let extremes = [samples[0], samples[2]];
        let chunk = DeltaChunk::new(&extremes);
        let decoded = DeltaChunk::unmarshal(&chunk.marshal()).unwrap();
        assert_eq!(decoded.samples().unwrap(), extremes);
    }

    #[test]
    fn test_negative_first_timestamp() {
        let samples = vec![
            SamplePair::new(Time(-5_000), 0.5),
            SamplePair::new(Time(-1_000), 0.25),
        ];
        let chunk = DeltaChunk::new(&samples);
        assert_eq!(DeltaChunk::unmarshal(&chunk.marshal()).unwrap().samples().unwrap(), samples);
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut body = DeltaChunk::new(&[SamplePair::new(Time(1), 1.0)]).marshal().to_vec();
        body.push(0);
        assert!(matches!(
            DeltaChunk::unmarshal(&body),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_body() {
        let body = DeltaChunk::new(&[
            SamplePair::new(Time(1), 1.0),
            SamplePair::new(Time(2), 2.0),
        ])
        .marshal();
        assert!(DeltaChunk::unmarshal(&body[..body.len() - 1]).is_err());
    }
}
