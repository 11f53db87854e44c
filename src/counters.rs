//! Per-stage task counters, aggregated by the executor for job monitoring.

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Counter names exposed by the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Counter {
    VerticesFiltered,
    EdgesFiltered,
    VerticesProcessed,
    OutEdgesProcessed,
    InEdgesProcessed,
    EdgesProcessed,
    VerticesCounted,
    EdgesCounted,
}

impl Counter {
    pub fn as_str(self) -> &'static str {
        match self {
            Counter::VerticesFiltered => "VERTICES_FILTERED",
            Counter::EdgesFiltered => "EDGES_FILTERED",
            Counter::VerticesProcessed => "VERTICES_PROCESSED",
            Counter::OutEdgesProcessed => "OUT_EDGES_PROCESSED",
            Counter::InEdgesProcessed => "IN_EDGES_PROCESSED",
            Counter::EdgesProcessed => "EDGES_PROCESSED",
            Counter::VerticesCounted => "VERTICES_COUNTED",
            Counter::EdgesCounted => "EDGES_COUNTED",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of counter values. Absent counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    values: HashMap<Counter, u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, counter: Counter, delta: u64) {
        *self.values.entry(counter).or_insert(0) += delta;
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.values.get(&counter).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: &Counters) {
        for (counter, value) in &other.values {
            self.increment(*counter, *value);
        }
    }

    /// Non-zero counters in name order.
    pub fn snapshot(&self) -> Vec<(Counter, u64)> {
        let mut all: Vec<(Counter, u64)> = self
            .values
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|(c, v)| (*c, *v))
            .collect();
        all.sort();
        all
    }
}
