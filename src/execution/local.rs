//! In-process executor.
//!
//! Stands in for the external substrate: splits input into contiguous map
//! tasks, runs each on its own scoped thread, combines map output in
//! spill-sized batches as it is emitted, hash-partitions it across reduce
//! tasks, sorts each partition with the reducer's key order and reduces each
//! key group once. Reducers that need a total order get one partition.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::thread;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{PipelineConfig, StageConfiguration, MAP_SPILL_OVER};
use crate::counters::Counters;
use crate::extract::ExtractorRegistry;
use crate::model::Vertex;
use crate::output::{Outputs, ShuffleSink, SideEffect};
use crate::stage::{CombineStage, MapContext, MapStage, ReduceContext, ReduceStage};
use crate::{Error, Result};

/// Everything one job produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOutput {
    /// GRAPH records in input order.
    pub graph: Vec<Vertex>,
    /// Map-phase side effects in input order, then reduce output in key
    /// order per partition.
    pub side_effects: Vec<SideEffect>,
    pub counters: Counters,
}

/// One map task's result.
struct MapTaskOutput<K, V> {
    graph: Vec<Vertex>,
    side_effects: Vec<SideEffect>,
    /// Combined shuffle pairs, one list per reduce partition.
    partitions: Vec<Vec<(K, V)>>,
}

#[derive(Debug, Clone)]
pub struct LocalExecutor {
    config: PipelineConfig,
}

impl LocalExecutor {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fill pipeline-wide defaults into a stage bundle and pass it through
    /// its wire form, as tasks on a remote substrate would receive it.
    fn prepare(&self, conf: &StageConfiguration) -> Result<StageConfiguration> {
        let mut conf = conf.clone();
        self.config.apply_defaults(&mut conf);
        StageConfiguration::decode(&conf.encode()?)
    }

    /// Run a stage that has no shuffle.
    pub fn run_map_only<M>(
        &self,
        conf: &StageConfiguration,
        registry: &ExtractorRegistry,
        input: Vec<Vertex>,
    ) -> Result<JobOutput>
    where
        M: MapStage,
    {
        let conf = &self.prepare(conf)?;
        let counters = Mutex::new(Counters::new());
        let tasks = self.map_phase::<M, NoShuffle<M>>(conf, registry, input, 1, &counters)?;

        let mut out = JobOutput::default();
        for task in tasks {
            out.graph.extend(task.graph);
            out.side_effects.extend(task.side_effects);
        }
        out.counters = counters.into_inner();
        info!(
            stage = M::NAME,
            records = out.graph.len(),
            side_effects = out.side_effects.len(),
            "map-only job finished"
        );
        Ok(out)
    }

    /// Run a stage with combine and reduce phases.
    pub fn run_map_reduce<M, C, R>(
        &self,
        conf: &StageConfiguration,
        registry: &ExtractorRegistry,
        input: Vec<Vertex>,
    ) -> Result<JobOutput>
    where
        M: MapStage,
        C: CombineStage<Key = M::Key, Value = M::Value>,
        R: ReduceStage<Key = M::Key, Value = M::Value>,
    {
        let conf = &self.prepare(conf)?;
        let reduce_tasks = if R::TOTAL_ORDER { 1 } else { self.config.reduce_tasks };
        if reduce_tasks != self.config.reduce_tasks {
            debug!(stage = R::NAME, requested = self.config.reduce_tasks, "total order, reducing in one partition");
        }

        let counters = Mutex::new(Counters::new());
        let tasks = self.map_phase::<M, C>(conf, registry, input, reduce_tasks, &counters)?;

        let mut out = JobOutput::default();
        let mut partitions: Vec<Vec<(M::Key, M::Value)>> = (0..reduce_tasks).map(|_| Vec::new()).collect();
        for task in tasks {
            out.graph.extend(task.graph);
            out.side_effects.extend(task.side_effects);
            for (partition, pairs) in partitions.iter_mut().zip(task.partitions) {
                partition.extend(pairs);
            }
        }

        let reduced = self.reduce_phase::<R>(conf, registry, partitions, &counters)?;
        for effects in reduced {
            out.side_effects.extend(effects);
        }
        out.counters = counters.into_inner();
        info!(
            stage = R::NAME,
            records = out.graph.len(),
            side_effects = out.side_effects.len(),
            "map-reduce job finished"
        );
        Ok(out)
    }

    // ========================================================================
    // Phases
    // ========================================================================

    fn map_phase<M, C>(
        &self,
        conf: &StageConfiguration,
        registry: &ExtractorRegistry,
        input: Vec<Vertex>,
        reduce_tasks: usize,
        counters: &Mutex<Counters>,
    ) -> Result<Vec<MapTaskOutput<M::Key, M::Value>>>
    where
        M: MapStage,
        C: CombineStage<Key = M::Key, Value = M::Value>,
    {
        let splits = split_input(input, self.config.map_tasks);
        debug!(stage = M::NAME, tasks = splits.len(), "starting map phase");

        let results: Vec<Result<MapTaskOutput<M::Key, M::Value>>> = thread::scope(|scope| {
            let handles: Vec<_> = splits
                .into_iter()
                .enumerate()
                .map(|(task, split)| {
                    scope.spawn(move || {
                        run_map_task::<M, C>(conf, registry, split, reduce_tasks, counters)
                            .map_err(|e| e.in_task(M::NAME, task))
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(task, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(Error::TaskPanicked { stage: M::NAME, task }))
                })
                .collect()
        });

        results.into_iter().collect()
    }

    fn reduce_phase<R>(
        &self,
        conf: &StageConfiguration,
        registry: &ExtractorRegistry,
        partitions: Vec<Vec<(R::Key, R::Value)>>,
        counters: &Mutex<Counters>,
    ) -> Result<Vec<Vec<SideEffect>>>
    where
        R: ReduceStage,
        R::Key: Eq + Hash + Send,
        R::Value: Send,
    {
        debug!(stage = R::NAME, tasks = partitions.len(), "starting reduce phase");

        let results: Vec<Result<Vec<SideEffect>>> = thread::scope(|scope| {
            let handles: Vec<_> = partitions
                .into_iter()
                .enumerate()
                .map(|(task, pairs)| {
                    scope.spawn(move || {
                        run_reduce_task::<R>(conf, registry, pairs, counters)
                            .map_err(|e| e.in_task(R::NAME, task))
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(task, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(Error::TaskPanicked { stage: R::NAME, task }))
                })
                .collect()
        });

        results.into_iter().collect()
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Identity combiner slot for map-only stages.
type NoShuffle<M> = crate::stage::NoCombine<<M as MapStage>::Key, <M as MapStage>::Value>;

fn run_map_task<M, C>(
    conf: &StageConfiguration,
    registry: &ExtractorRegistry,
    split: Vec<Vertex>,
    reduce_tasks: usize,
    counters: &Mutex<Counters>,
) -> Result<MapTaskOutput<M::Key, M::Value>>
where
    M: MapStage,
    C: CombineStage<Key = M::Key, Value = M::Value>,
{
    let records = split.len();
    let mut graph: Vec<Vertex> = Vec::with_capacity(records);
    let mut side_effects: Vec<SideEffect> = Vec::new();
    let batch: usize = conf.require_parsed(MAP_SPILL_OVER)?;
    let mut shuffle = CombiningShuffle::new(C::setup(conf)?, batch, reduce_tasks);

    let (emitted, task_counters) = {
        let mut stage = M::setup(conf, registry)?;
        let mut ctx = MapContext::new(Outputs::new(&mut graph, &mut side_effects), &mut shuffle);
        for vertex in split {
            stage.map(vertex, &mut ctx)?;
        }
        stage.cleanup(&mut ctx)?;
        let emitted = ctx.emitted();
        (emitted, ctx.finish()?)
    };

    counters.lock().merge(&task_counters);
    debug!(
        stage = M::NAME,
        records,
        emitted,
        spills = shuffle.spills,
        peak = shuffle.peak,
        "map task finished"
    );

    Ok(MapTaskOutput { graph, side_effects, partitions: shuffle.into_partitions() })
}

// ============================================================================
// Shuffle
// ============================================================================

/// Map-side shuffle writer. Pairs are buffered until the spill threshold is
/// exceeded, then combined per key and routed to their reduce partition.
struct CombiningShuffle<C: CombineStage> {
    combiner: C,
    batch: usize,
    buffer: Vec<(C::Key, C::Value)>,
    partitions: Vec<Vec<(C::Key, C::Value)>>,
    spills: usize,
    /// Largest the buffer has grown.
    peak: usize,
}

impl<C> CombiningShuffle<C>
where
    C: CombineStage,
    C::Key: Eq + Hash + Clone,
{
    fn new(combiner: C, batch: usize, partitions: usize) -> Self {
        Self {
            combiner,
            batch,
            buffer: Vec::new(),
            partitions: (0..partitions.max(1)).map(|_| Vec::new()).collect(),
            spills: 0,
            peak: 0,
        }
    }

    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let partitions = self.partitions.len();
        for (key, values) in group_by_key(std::mem::take(&mut self.buffer)) {
            let slot = partition_of(&key, partitions);
            for value in self.combiner.combine(&key, values)? {
                self.partitions[slot].push((key.clone(), value));
            }
        }
        self.spills += 1;
        Ok(())
    }

    fn into_partitions(self) -> Vec<Vec<(C::Key, C::Value)>> {
        self.partitions
    }
}

impl<C> ShuffleSink<C::Key, C::Value> for CombiningShuffle<C>
where
    C: CombineStage,
    C::Key: Eq + Hash + Clone,
{
    fn emit(&mut self, key: C::Key, value: C::Value) -> Result<()> {
        self.buffer.push((key, value));
        self.peak = self.peak.max(self.buffer.len());
        if self.buffer.len() > self.batch {
            self.spill()?;
        }
        Ok(())
    }

    fn flush_shuffle(&mut self) -> Result<()> {
        self.spill()
    }
}

/// Reduce partition of a key. Fixed-key hashing keeps assignment stable
/// across runs.
fn partition_of<K: Hash>(key: &K, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

fn run_reduce_task<R>(
    conf: &StageConfiguration,
    registry: &ExtractorRegistry,
    pairs: Vec<(R::Key, R::Value)>,
    counters: &Mutex<Counters>,
) -> Result<Vec<SideEffect>>
where
    R: ReduceStage,
    R::Key: Eq + Hash,
{
    let mut side_effects: Vec<SideEffect> = Vec::new();
    let mut reducer = R::setup(conf, registry)?;

    let mut groups = group_by_key(pairs);
    groups.sort_by(|(a, _), (b, _)| reducer.compare_keys(a, b));
    let keys = groups.len();

    let task_counters = {
        let mut ctx = ReduceContext::new(&mut side_effects);
        for (key, values) in groups {
            reducer.reduce(key, values, &mut ctx)?;
        }
        reducer.cleanup(&mut ctx)?;
        ctx.finish()?
    };

    counters.lock().merge(&task_counters);
    debug!(stage = R::NAME, keys, side_effects = side_effects.len(), "reduce task finished");
    Ok(side_effects)
}

/// Group pairs by key. Groups come out in first-seen order.
fn group_by_key<K: Eq + Hash, V>(pairs: Vec<(K, V)>) -> Vec<(K, Vec<V>)> {
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(Option<K>, Vec<V>)> = Vec::new();
    for (key, value) in pairs {
        match index.get(&key) {
            Some(&slot) => groups[slot].1.push(value),
            None => {
                index.insert(key, groups.len());
                groups.push((None, vec![value]));
            }
        }
    }
    for (key, slot) in index {
        groups[slot].0 = Some(key);
    }
    groups
        .into_iter()
        .filter_map(|(key, values)| key.map(|k| (k, values)))
        .collect()
}

/// Contiguous splits, at most `tasks` of them, never zero.
fn split_input(input: Vec<Vertex>, tasks: usize) -> Vec<Vec<Vertex>> {
    if input.is_empty() {
        return vec![Vec::new()];
    }
    let size = input.len().div_ceil(tasks.max(1));
    let mut splits = Vec::with_capacity(tasks);
    let mut records = input.into_iter().peekable();
    while records.peek().is_some() {
        splits.push(records.by_ref().take(size).collect());
    }
    splits
}
