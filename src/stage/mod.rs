//! # Stage Contracts
//!
//! A stage is a map function with an optional combiner and reducer. This is
//! THE contract between the stage library and whatever substrate moves data
//! between tasks: a task calls `setup` once with the decoded configuration,
//! `map` once per input vertex, `cleanup` once at the end.
//!
//! ## Stages
//!
//! | Stage | Map | Combine | Reduce |
//! |-------|-----|---------|--------|
//! | Interval filter | `IntervalFilterMap` | | |
//! | GroupCount | `GroupCountMap` | `GroupCountCombine` | `GroupCountReduce` |
//! | Order | `OrderMap` | | `OrderReduce` |
//! | Property | `PropertyValueMap` | | |
//! | Transform | `TransformMap` | | |
//! | EdgesVertices | `EdgesVerticesMap` | | |
//! | Count | `CountMap` | `CountCombine` | `CountReduce` |

pub mod filter;
pub mod group_count;
pub mod order;
pub mod property;
pub mod transform;
pub mod edges_vertices;
pub mod count;

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::config::StageConfiguration;
use crate::counters::{Counter, Counters};
use crate::extract::ExtractorRegistry;
use crate::model::{GraphElement, Vertex};
use crate::output::{Outputs, ShuffleSink, SideEffect, SideEffectSink};
use crate::{Error, Result};

pub use filter::{Interval, IntervalFilterConfig, IntervalFilterMap};
pub use group_count::{GroupCountCombine, GroupCountConfig, GroupCountMap, GroupCountReduce};
pub use order::{OrderConfig, OrderMap, OrderReduce};
pub use property::{PropertyConfig, PropertyValueMap};
pub use transform::{TransformConfig, TransformMap};
pub use edges_vertices::{EdgesVerticesConfig, EdgesVerticesMap};
pub use count::{CountCombine, CountConfig, CountMap, CountReduce};

// ============================================================================
// Traits
// ============================================================================

/// The map phase of a stage.
pub trait MapStage: Sized + Send {
    /// Stage name used in errors and logs.
    const NAME: &'static str;

    /// Shuffle key; `()` for map-only stages.
    type Key: Clone + Eq + Hash + Debug + Send;
    type Value: Send;

    /// Decode the configuration and build private task state.
    fn setup(conf: &StageConfiguration, registry: &ExtractorRegistry) -> Result<Self>;

    /// Process one vertex record. The record is owned by this call and
    /// must be written to GRAPH exactly once.
    fn map(&mut self, vertex: Vertex, ctx: &mut MapContext<'_, Self::Key, Self::Value>) -> Result<()>;

    fn cleanup(&mut self, _ctx: &mut MapContext<'_, Self::Key, Self::Value>) -> Result<()> {
        Ok(())
    }
}

/// Map-side pre-aggregation of the values of one key.
pub trait CombineStage: Sized + Send {
    type Key;
    type Value;

    fn setup(conf: &StageConfiguration) -> Result<Self>;

    fn combine(&mut self, key: &Self::Key, values: Vec<Self::Value>) -> Result<Vec<Self::Value>>;
}

/// The reduce phase of a stage. Every value of one key reaches exactly one
/// `reduce` call, in no particular order.
pub trait ReduceStage: Sized + Send {
    const NAME: &'static str;

    /// Output must be ordered across every key, not just within a
    /// partition. Such stages reduce in a single partition.
    const TOTAL_ORDER: bool = false;

    type Key;
    type Value;

    fn setup(conf: &StageConfiguration, registry: &ExtractorRegistry) -> Result<Self>;

    /// Order in which keys are presented to `reduce`.
    fn compare_keys(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    fn reduce(&mut self, key: Self::Key, values: Vec<Self::Value>, ctx: &mut ReduceContext<'_>) -> Result<()>;

    fn cleanup(&mut self, _ctx: &mut ReduceContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Identity combiner for stages without map-side aggregation.
pub struct NoCombine<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> CombineStage for NoCombine<K, V> {
    type Key = K;
    type Value = V;

    fn setup(_conf: &StageConfiguration) -> Result<Self> {
        Ok(Self(PhantomData))
    }

    fn combine(&mut self, _key: &K, values: Vec<V>) -> Result<Vec<V>> {
        Ok(values)
    }
}

// ============================================================================
// Contexts
// ============================================================================

/// What a map task can write to: the shuffle, both output channels and its
/// counters.
pub struct MapContext<'a, K, V> {
    outputs: Outputs<'a>,
    shuffle: &'a mut dyn ShuffleSink<K, V>,
    emitted: u64,
    counters: Counters,
}

impl<'a, K, V> MapContext<'a, K, V> {
    pub fn new(outputs: Outputs<'a>, shuffle: &'a mut dyn ShuffleSink<K, V>) -> Self {
        Self {
            outputs,
            shuffle,
            emitted: 0,
            counters: Counters::new(),
        }
    }

    /// Send a pair to the shuffle.
    pub fn emit(&mut self, key: K, value: V) -> Result<()> {
        self.shuffle.emit(key, value)?;
        self.emitted += 1;
        Ok(())
    }

    pub fn write_graph(&mut self, vertex: Vertex) -> Result<()> {
        self.outputs.write_graph(vertex)
    }

    pub fn write_side_effect(&mut self, effect: SideEffect) -> Result<()> {
        self.outputs.write_side_effect(effect)
    }

    pub fn increment(&mut self, counter: Counter, delta: u64) {
        self.counters.increment(counter, delta);
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Pairs sent to the shuffle so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Flush the shuffle, close the outputs and hand back the counters.
    pub fn finish(mut self) -> Result<Counters> {
        self.shuffle.flush_shuffle()?;
        self.outputs.close()?;
        Ok(self.counters)
    }
}

/// What a reduce task can write to.
pub struct ReduceContext<'a> {
    sink: &'a mut dyn SideEffectSink,
    counters: Counters,
}

impl<'a> ReduceContext<'a> {
    pub fn new(sink: &'a mut dyn SideEffectSink) -> Self {
        Self { sink, counters: Counters::new() }
    }

    pub fn write_side_effect(&mut self, effect: SideEffect) -> Result<()> {
        self.sink.write_side_effect(effect)
    }

    pub fn increment(&mut self, counter: Counter, delta: u64) {
        self.counters.increment(counter, delta);
    }

    pub fn finish(self) -> Result<Counters> {
        self.sink.flush_side_effects()?;
        Ok(self.counters)
    }
}

/// An element's multiplicity as a signed weight.
pub(crate) fn paths_as_i64(element: GraphElement<'_>, stage: &'static str) -> Result<i64> {
    i64::try_from(element.path_count()).map_err(|_| Error::Overflow { stage, element: element.micro() })
}
