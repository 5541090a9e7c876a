//! Turning fetched chunks into per-series sample streams.

use super::Chunk;
use crate::model::{merge_sample_sets, Fingerprint, SampleStream};
use crate::Result;

use std::collections::BTreeMap;

/// Group chunks by series fingerprint and merge each group's samples into
/// one timestamp-ordered stream. Overlapping samples at the same timestamp
/// are kept once. Streams come back ordered by fingerprint.
pub fn chunks_to_matrix(chunks: &[Chunk]) -> Result<Vec<SampleStream>> {
    let mut by_series: BTreeMap<Fingerprint, SampleStream> = BTreeMap::new();
    for chunk in chunks {
        let samples = chunk.samples()?;
        let desc = chunk.descriptor();
        match by_series.get_mut(&desc.fingerprint) {
            Some(stream) => stream.values = merge_sample_sets(&stream.values, &samples),
            None => {
                by_series.insert(
                    desc.fingerprint,
                    SampleStream {
                        metric: desc.metric.clone(),
                        values: samples,
                    },
                );
            }
        }
    }
    Ok(by_series.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Descriptor;
    use crate::encoding::Encoding;
    use crate::model::{Metric, SamplePair, Time, METRIC_NAME_LABEL};

    fn chunk(name: &str, samples: &[(i64, f64)]) -> Chunk {
        let metric = Metric::new()
            .with_label(METRIC_NAME_LABEL, name)
            .with_label("bar", "baz");
        let samples: Vec<SamplePair> = samples
            .iter()
            .map(|&(ts, v)| SamplePair::new(Time(ts), v))
            .collect();
        let from = samples.first().map(|s| s.timestamp).unwrap_or_default();
        let through = samples.last().map(|s| s.timestamp).unwrap_or_default();
        Chunk::from_samples(
            Descriptor::new("userID", metric, from, through, Encoding::Delta),
            &samples,
        )
        .unwrap()
    }

    #[test]
    fn test_empty() {
        assert!(chunks_to_matrix(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_groups_and_merges_same_series() {
        let chunk1 = chunk("foo", &[(1, 1.0), (3, 3.0)]);
        let chunk2 = chunk("foo", &[(2, 2.0), (3, 3.0), (4, 4.0)]);
        let chunk3 = chunk("foo2", &[(1, 10.0)]);

        let matrix = chunks_to_matrix(&[chunk1.clone(), chunk2, chunk3.clone()]).unwrap();
        assert_eq!(matrix.len(), 2);

        let foo = matrix
            .iter()
            .find(|s| s.metric == chunk1.descriptor().metric)
            .unwrap();
        let ts: Vec<i64> = foo.values.iter().map(|s| s.timestamp.0).collect();
        assert_eq!(ts, vec![1, 2, 3, 4]);

        let foo2 = matrix
            .iter()
            .find(|s| s.metric == chunk3.descriptor().metric)
            .unwrap();
        assert_eq!(foo2.values, vec![SamplePair::new(Time(1), 10.0)]);
    }
}
