//! Core value types: timestamps, fingerprints, label sets and samples.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Label holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const LABEL_SEPARATOR: u8 = 0xff;

/// Millisecond timestamp since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(pub i64);

impl Time {
    pub fn now() -> Self {
        Time(Utc::now().timestamp_millis())
    }

    pub fn from_unix_secs(secs: i64) -> Self {
        Time(secs.saturating_mul(1000))
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn add(&self, d: Duration) -> Self {
        Time(self.0.saturating_add(d.as_millis() as i64))
    }

    pub fn sub(&self, d: Duration) -> Self {
        Time(self.0.saturating_sub(d.as_millis() as i64))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable 64-bit hash of a label set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A full label set identifying one series.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metric(BTreeMap<String, String>);

impl Metric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// FNV-1a over every `name 0xff value 0xff` in label-name order.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hash = FNV_OFFSET_BASIS;
        for (name, value) in &self.0 {
            for byte in name
                .bytes()
                .chain(std::iter::once(LABEL_SEPARATOR))
                .chain(value.bytes())
                .chain(std::iter::once(LABEL_SEPARATOR))
            {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        Fingerprint(hash)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metric {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Metric(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.metric_name().unwrap_or(""))?;
        let mut first = true;
        for (name, value) in self.iter().filter(|(name, _)| *name != METRIC_NAME_LABEL) {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}=\"{}\"", name, value)?;
            first = false;
        }
        write!(f, "}}")
    }
}

/// One sample of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePair {
    pub timestamp: Time,
    pub value: f64,
}

impl SamplePair {
    pub fn new(timestamp: Time, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// All samples of one series in a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStream {
    pub metric: Metric,
    pub values: Vec<SamplePair>,
}

/// Merge two timestamp-sorted sample slices. Equal timestamps keep the
/// sample from `a`.
pub fn merge_sample_sets(a: &[SamplePair], b: &[SamplePair]) -> Vec<SamplePair> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].timestamp.cmp(&b[j].timestamp) {
            std::cmp::Ordering::Less => {
                result.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                result.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(ts: i64, v: f64) -> SamplePair {
        SamplePair::new(Time(ts), v)
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = Metric::new()
            .with_label(METRIC_NAME_LABEL, "foo")
            .with_label("bar", "baz");
        let b: Metric = vec![("bar", "baz"), (METRIC_NAME_LABEL, "foo")]
            .into_iter()
            .collect();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_label_boundaries() {
        let a = Metric::new().with_label("ab", "c");
        let b = Metric::new().with_label("a", "bc");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_empty_metric_fingerprint() {
        assert_eq!(Metric::new().fingerprint(), Fingerprint(FNV_OFFSET_BASIS));
    }

    #[test]
    fn test_time_arithmetic() {
        let t = Time(1_000);
        assert_eq!(t.add(Duration::from_secs(1)), Time(2_000));
        assert_eq!(t.sub(Duration::from_millis(1_500)), Time(-500));
        assert_eq!(Time::from_unix_secs(3), Time(3_000));
    }

    #[test]
    fn test_merge_sample_sets() {
        let a = vec![s(1, 1.0), s(3, 3.0), s(5, 5.0)];
        let b = vec![s(2, 2.0), s(3, 30.0), s(6, 6.0)];
        let merged = merge_sample_sets(&a, &b);
        assert_eq!(
            merged,
            vec![s(1, 1.0), s(2, 2.0), s(3, 3.0), s(5, 5.0), s(6, 6.0)]
        );
    }

    #[test]
    fn test_metric_display() {
        let m = Metric::new()
            .with_label(METRIC_NAME_LABEL, "up")
            .with_label("job", "api");
        assert_eq!(m.to_string(), "up{job=\"api\"}");
    }
}
