//! # Spill-Guarded Aggregation
//!
//! `CounterMap` is a multiset counter: group key → running signed sum.
//! `SpillingCounterMap` puts a ceiling on the number of distinct keys held in
//! memory. Once the ceiling is exceeded every entry is flushed downstream and
//! the map starts empty again, so one key may leave a task as several partial
//! sums. Downstream summation re-merges them.

use std::hash::Hash;

use hashbrown::HashMap;
use tracing::debug;

use crate::Result;

/// Group key → running i64 sum. Entries are created on first increment.
#[derive(Debug, Clone)]
pub struct CounterMap<K> {
    counts: HashMap<K, i64>,
}

impl<K: Eq + Hash> Default for CounterMap<K> {
    fn default() -> Self {
        Self { counts: HashMap::new() }
    }
}

impl<K: Eq + Hash> CounterMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the count for `key` and return the new total.
    pub fn incr(&mut self, key: K, delta: i64) -> i64 {
        let entry = self.counts.entry(key).or_insert(0);
        *entry = entry.wrapping_add(delta);
        *entry
    }

    pub fn get(&self, key: &K) -> Option<i64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &i64)> {
        self.counts.iter()
    }

    /// Remove and yield every entry.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, i64)> + '_ {
        self.counts.drain()
    }

    /// Sum of all counts.
    pub fn total(&self) -> i64 {
        self.counts.values().fold(0i64, |acc, v| acc.wrapping_add(*v))
    }
}

/// A [`CounterMap`] that flushes once it holds more than `threshold` keys.
#[derive(Debug)]
pub struct SpillingCounterMap<K> {
    map: CounterMap<K>,
    threshold: usize,
    spills: u64,
}

impl<K: Eq + Hash> SpillingCounterMap<K> {
    pub fn new(threshold: usize) -> Self {
        Self {
            map: CounterMap::new(),
            threshold,
            spills: 0,
        }
    }

    pub fn incr(&mut self, key: K, delta: i64) {
        self.map.incr(key, delta);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// How many threshold-triggered flushes have happened.
    pub fn spills(&self) -> u64 {
        self.spills
    }

    /// Flush through `sink` if the key count is over the threshold.
    /// Returns whether a spill happened.
    pub fn spill_if_full<F>(&mut self, sink: F) -> Result<bool>
    where
        F: FnMut(K, i64) -> Result<()>,
    {
        if self.map.len() <= self.threshold {
            return Ok(false);
        }
        debug!(entries = self.map.len(), threshold = self.threshold, "spilling counter map");
        self.spills += 1;
        self.flush(sink)?;
        Ok(true)
    }

    /// Flush every entry through `sink` and clear.
    pub fn flush<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(K, i64) -> Result<()>,
    {
        for (key, count) in self.map.drain() {
            sink(key, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_map_incr() {
        let mut map = CounterMap::new();
        assert_eq!(map.incr("a", 2), 2);
        assert_eq!(map.incr("a", -5), -3);
        map.incr("b", 1);
        assert_eq!(map.get(&"a"), Some(-3));
        assert_eq!(map.len(), 2);
        assert_eq!(map.total(), -2);
    }

    #[test]
    fn test_no_spill_at_threshold() {
        let mut map = SpillingCounterMap::new(2);
        map.incr(1, 1);
        map.incr(2, 1);
        let spilled = map.spill_if_full(|_, _| Ok(())).unwrap();
        assert!(!spilled);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_spill_over_threshold_clears() {
        let mut map = SpillingCounterMap::new(2);
        for k in 0..3 {
            map.incr(k, 10);
        }
        let mut flushed = Vec::new();
        let spilled = map
            .spill_if_full(|k, v| {
                flushed.push((k, v));
                Ok(())
            })
            .unwrap();
        assert!(spilled);
        assert!(map.is_empty());
        assert_eq!(map.spills(), 1);
        flushed.sort();
        assert_eq!(flushed, vec![(0, 10), (1, 10), (2, 10)]);
    }

    #[test]
    fn test_flush_propagates_sink_error() {
        let mut map = SpillingCounterMap::new(10);
        map.incr("k", 1);
        let result = map.flush(|_, _| Err(crate::Error::Output("closed".into())));
        assert!(result.is_err());
    }
}
