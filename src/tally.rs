// Counting helpers
// Ordered multiset counter used for every aggregate in the analysis

use std::collections::BTreeMap;

/// Occurrence counter with deterministic iteration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally<K: Ord> {
    counts: BTreeMap<K, usize>,
}

impl<K: Ord> Default for Tally<K> {
    fn default() -> Self {
        Tally {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> Tally<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K) {
        self.add_n(key, 1);
    }

    pub fn add_n(&mut self, key: K, n: usize) {
        *self.counts.entry(key).or_insert(0) += n;
    }

    pub fn get(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    /// Entries ordered by descending count, ties by key order
    pub fn most_common(&self, n: usize) -> Vec<(K, usize)> {
        let mut entries: Vec<(K, usize)> =
            self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }

    /// Sum of counts whose key satisfies the predicate
    pub fn sum_where(&self, mut pred: impl FnMut(&K) -> bool) -> usize {
        self.counts
            .iter()
            .filter(|(k, _)| pred(k))
            .map(|(_, v)| *v)
            .sum()
    }

    pub fn merge(&mut self, other: &Tally<K>) {
        for (k, v) in other.counts.iter() {
            self.add_n(k.clone(), *v);
        }
    }
}
