//! Probability maps: topic -> value hash -> probability.

use crate::types::{Topic, ValueHash};
use std::collections::BTreeMap;

pub type ProbabilityMap = BTreeMap<Topic, BTreeMap<ValueHash, f64>>;

/// Sum of every entry
pub fn total(map: &ProbabilityMap) -> f64 {
    map.values().flat_map(|by_hash| by_hash.values()).sum()
}

/// Scale a map so that its entries sum to 1
///
/// A map whose entries sum to 0 (including the empty map) is returned as is.
pub fn normalize(mut map: ProbabilityMap) -> ProbabilityMap {
    let total = total(&map);
    if total == 0.0 {
        return map;
    }
    for probability in map.values_mut().flat_map(|by_hash| by_hash.values_mut()) {
        *probability /= total;
    }
    map
}

/// Accumulates occurrence counts before they become probabilities
#[derive(Debug, Default)]
pub(crate) struct Counter {
    counts: BTreeMap<Topic, BTreeMap<ValueHash, u64>>,
}

impl Counter {
    pub(crate) fn add(&mut self, topic: &str, hash: ValueHash) {
        *self
            .counts
            .entry(topic.to_string())
            .or_default()
            .entry(hash)
            .or_default() += 1;
    }

    /// Divide every count by `denominator`
    pub(crate) fn into_frequencies(self, denominator: usize) -> ProbabilityMap {
        if denominator == 0 {
            return ProbabilityMap::new();
        }
        self.counts
            .into_iter()
            .map(|(topic, by_hash)| {
                let by_hash = by_hash
                    .into_iter()
                    .map(|(hash, count)| (hash, count as f64 / denominator as f64))
                    .collect();
                (topic, by_hash)
            })
            .collect()
    }
}
