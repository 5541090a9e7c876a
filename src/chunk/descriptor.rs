//! Chunk identity independent of the payload.

use crate::encoding::Encoding;
use crate::model::{Fingerprint, Metric, Time};
use crate::{Error, Result};

use serde::{Deserialize, Serialize};

/// Identity metadata for one chunk.
///
/// A descriptor starts out without a checksum and formats to the legacy
/// external key. [`Chunk::encode`](super::Chunk::encode) fixes `checksum`
/// and `checksum_set`, after which [`external_key`](Self::external_key)
/// yields the current, tenant-qualified form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Tenant the chunk belongs to
    pub user_id: String,
    /// Hash of `metric`
    pub fingerprint: Fingerprint,
    /// Full label set of the series
    pub metric: Metric,
    /// First sample timestamp (inclusive)
    pub from: Time,
    /// Last sample timestamp (inclusive)
    pub through: Time,
    /// Encoder that produced the payload
    pub encoding: Encoding,
    /// CRC32 of the encoded chunk, valid when `checksum_set`
    pub checksum: u32,
    pub checksum_set: bool,
}

impl Descriptor {
    /// Build a not-yet-encoded descriptor; the fingerprint is derived from
    /// `metric`.
    pub fn new(
        user_id: impl Into<String>,
        metric: Metric,
        from: Time,
        through: Time,
        encoding: Encoding,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            fingerprint: metric.fingerprint(),
            metric,
            from,
            through,
            encoding,
            checksum: 0,
            checksum_set: false,
        }
    }

    /// Same descriptor with a known checksum.
    pub fn with_checksum(mut self, checksum: u32) -> Self {
        self.checksum = checksum;
        self.checksum_set = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.from > self.through {
            return Err(Error::InvalidTimeRange {
                from: self.from.0,
                through: self.through.0,
            });
        }
        Ok(())
    }

    /// True when every identity field the codec checks agrees with `other`.
    pub(crate) fn same_identity(&self, other: &Descriptor) -> bool {
        self.user_id == other.user_id
            && self.fingerprint == other.fingerprint
            && self.from == other.from
            && self.through == other.through
    }
}
