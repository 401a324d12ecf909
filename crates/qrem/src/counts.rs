//! Outcome-count tables.
//!
//! An [`OutcomeCounts`] maps measured bit-strings to how often they were
//! observed. It serves both as raw calibration data and as the noisy or
//! mitigated result of an experiment. Keys are arbitrary strings; whether
//! they belong to a calibrated basis is checked by the consumer.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Observed outcome counts, keyed by bit-string.
///
/// Serializes as a plain JSON object: `{"00": 480, "11": 520}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeCounts {
    counts: FxHashMap<String, u64>,
}

impl OutcomeCounts {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create counts from `(bitstring, count)` pairs.
    /// Duplicate bitstrings are summed, consistent with [`insert`](Self::insert).
    pub fn from_pairs(iter: impl IntoIterator<Item = (impl Into<String>, u64)>) -> Self {
        let mut counts = Self::new();
        for (k, v) in iter {
            counts.insert(k, v);
        }
        counts
    }

    /// Add `count` observations of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.counts.entry(bitstring.into()).or_default() += count;
    }

    /// Count for `bitstring`, zero if absent.
    pub fn get(&self, bitstring: &str) -> u64 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }

    /// Iterate over `(bitstring, count)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.counts.iter()
    }

    /// Sum of all counts.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Most frequent bitstring, if any.
    pub fn most_frequent(&self) -> Option<(&String, &u64)> {
        self.counts.iter().max_by_key(|&(_, count)| count)
    }

    /// Relative frequency of each bitstring.
    #[allow(clippy::cast_precision_loss)]
    pub fn probabilities(&self) -> FxHashMap<String, f64> {
        let total = self.total_shots() as f64;
        if total == 0.0 {
            return FxHashMap::default();
        }
        self.counts
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total))
            .collect()
    }

    /// Entries sorted by count descending, then bitstring ascending.
    pub fn sorted(&self) -> Vec<(&String, &u64)> {
        let mut items: Vec<_> = self.counts.iter().collect();
        items.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        items
    }

    /// Number of distinct bitstrings.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if no bitstring has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u64)> for OutcomeCounts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (key, value) in iter {
            counts.insert(key, value);
        }
        counts
    }
}
