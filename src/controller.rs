//! Controls the execution of a word count job.
//!
//! A job moves through `Initialized → Splitting → MapCombining → Merging → Reducing →
//! WritingOutput` and ends in `Succeeded` or `Failed`. Any error moves it straight to
//! `Failed`, discards whatever the sink has staged, and is returned to the caller. There is
//! no retry at this level.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;

use scoped_threadpool::Pool;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::map::{MapPartition, MapStats};
use crate::merge::{Merger, ShardInput};
use crate::parameters::MRParameters;
use crate::phases::output::{write_output, ResultSink};
use crate::record_types::{range_shard, SharderF, WordCount};
use crate::reduce::ReducePartition;
use crate::split::{list_sources, split_file, Partition};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Initialized,
    Splitting,
    MapCombining,
    Merging,
    Reducing,
    WritingOutput,
    Succeeded,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Counters describing a finished job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub sources: u64,
    pub partitions: u64,
    pub input_bytes: u64,
    pub input_records: u64,
    /// Tokens emitted by the tokenizer over all partitions.
    pub map_output_tokens: u64,
    /// (word, count) pairs emitted by the combiners, i.e. what crossed the merge barrier.
    pub combine_output_records: u64,
    /// Distinct words in the final table.
    pub reduce_output_records: u64,
}

impl JobCounters {
    fn add_map(&mut self, stats: &MapStats) {
        self.input_bytes += stats.bytes;
        self.input_records += stats.records;
        self.map_output_tokens += stats.tokens;
        self.combine_output_records += stats.distinct;
    }
}

#[derive(Clone, Debug)]
pub struct JobReport {
    pub state: JobState,
    pub counters: JobCounters,
}

pub struct MRController {
    params: MRParameters,
    state: JobState,
    history: Vec<JobState>,
    counters: JobCounters,
    sharder: SharderF,
}

/// Size of a thread pool running `n` units of work at once.
fn pool_size(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::config(format!("cannot run {} threads", n)))
}

impl MRController {
    pub fn new(params: MRParameters) -> MRController {
        MRController {
            params,
            state: JobState::Initialized,
            history: vec![JobState::Initialized],
            counters: JobCounters::default(),
            sharder: range_shard,
        }
    }

    /// Replaces the function assigning words to key shards. It must be monotonic in word
    /// order for the output units to concatenate into one sorted table.
    ///
    /// Default: `range_shard`
    pub fn set_sharder(mut self, sharder: SharderF) -> MRController {
        self.sharder = sharder;
        self
    }

    /// Create a new job and execute it immediately.
    pub fn run<S: ResultSink>(params: MRParameters, inputs: &[PathBuf], sink: &mut S) -> Result<JobReport> {
        MRController::new(params).execute(inputs, sink)
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state the job has been in, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn counters(&self) -> &JobCounters {
        &self.counters
    }

    /// Runs the job over `inputs` and commits the result to `sink`. On error nothing is
    /// committed and the sink is told to abort.
    pub fn execute<S: ResultSink>(&mut self, inputs: &[PathBuf], sink: &mut S) -> Result<JobReport> {
        if self.state != JobState::Initialized {
            return Err(Error::execution(format!("job already ran (state {})", self.state)));
        }

        match self.run_phases(inputs, sink) {
            Ok(()) => {
                self.transition(JobState::Succeeded);
                info!(counters = ?self.counters, "job succeeded");
                Ok(JobReport {
                    state: self.state,
                    counters: self.counters.clone(),
                })
            }
            Err(e) => {
                sink.abort();
                warn!(failed_in = %self.state, "job failed: {}", e);
                self.transition(JobState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: JobState) {
        debug!(from = %self.state, to = %next, "job state");
        self.state = next;
        self.history.push(next);
    }

    fn run_phases<S: ResultSink>(&mut self, inputs: &[PathBuf], sink: &mut S) -> Result<()> {
        self.params.validate()?;
        if inputs.is_empty() {
            return Err(Error::config("no input location given"));
        }

        self.transition(JobState::Splitting);
        let partitions = self.run_split(inputs)?;

        self.transition(JobState::MapCombining);
        let merger = self.run_map(partitions)?;

        self.transition(JobState::Merging);
        let shard_inputs = merger.finish()?;

        self.transition(JobState::Reducing);
        let shards = self.run_reduce(shard_inputs)?;

        let total: u64 = shards.iter().flatten().map(|wc| wc.count).sum();
        if total != self.counters.map_output_tokens {
            return Err(Error::execution(format!(
                "reduced {} occurrences but the map phase emitted {} tokens",
                total, self.counters.map_output_tokens
            )));
        }

        self.transition(JobState::WritingOutput);
        self.counters.reduce_output_records = write_output(sink, &self.params, &shards)?;
        sink.commit()
    }

    fn run_split(&mut self, inputs: &[PathBuf]) -> Result<Vec<Partition>> {
        let sources = list_sources(inputs)?;
        let mut partitions = Vec::new();

        for source in &sources {
            let mut parts = split_file(source, self.params.max_partition_size, partitions.len())?;
            partitions.append(&mut parts);
        }

        self.counters.sources = sources.len() as u64;
        self.counters.partitions = partitions.len() as u64;
        info!(
            sources = sources.len(),
            partitions = partitions.len(),
            max_partition_size = self.params.max_partition_size,
            "input split"
        );
        Ok(partitions)
    }

    /// Runs every partition on the mapper pool and feeds the results to a merger. Once a
    /// partition fails no further partitions are started; the job fails with the error of the
    /// lowest failed partition.
    fn run_map(&mut self, partitions: Vec<Partition>) -> Result<Merger> {
        let mut merger = Merger::new(partitions.len(), self.params.reducers);
        if partitions.is_empty() {
            return Ok(merger);
        }

        let mut pool = Pool::new(pool_size(self.params.mappers.min(partitions.len()))?);
        let (send, recv) = channel();
        let failed = AtomicBool::new(false);

        pool.scoped(|scope| {
            for partition in partitions {
                let params = self.params.clone();
                let sharder = self.sharder;
                let done = send.clone();
                let failed = &failed;

                scope.execute(move || {
                    if failed.load(Ordering::SeqCst) {
                        return;
                    }
                    let index = partition.index;
                    let res = panic::catch_unwind(AssertUnwindSafe(|| {
                        MapPartition::new(params, partition).set_sharder(sharder).run()
                    }))
                    .unwrap_or_else(|_| {
                        Err(Error::execution(format!("map partition {} panicked", index)))
                    });
                    if res.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    let _ = done.send((index, res));
                });
            }
            scope.join_all();
        });
        drop(send);

        let mut first_error: Option<(usize, Error)> = None;
        for (index, res) in recv {
            match res {
                Ok((runs, stats)) => {
                    self.counters.add_map(&stats);
                    merger.accept(runs)?;
                }
                Err(e) => {
                    if first_error.as_ref().map_or(true, |(i, _)| index < *i) {
                        first_error = Some((index, e));
                    }
                }
            }
        }
        if let Some((index, e)) = first_error {
            warn!(partition = index, "map partition failed");
            return Err(e);
        }

        info!(
            partitions = merger.received(),
            tokens = self.counters.map_output_tokens,
            combined = self.counters.combine_output_records,
            "map phase done"
        );
        Ok(merger)
    }

    /// Reduces every key shard on the reducer pool. Returns the final counts per shard, in
    /// shard order.
    fn run_reduce(&mut self, inputs: Vec<ShardInput>) -> Result<Vec<Vec<WordCount>>> {
        let n = inputs.len();
        let mut outputs: Vec<Option<Vec<WordCount>>> = vec![None; n];

        let mut pool = Pool::new(pool_size(self.params.reducers.clamp(1, n.max(1)))?);
        let (send, recv) = channel();

        pool.scoped(|scope| {
            for input in inputs {
                let done = send.clone();
                scope.execute(move || {
                    let shard = input.shard();
                    let res = panic::catch_unwind(AssertUnwindSafe(|| ReducePartition::new(input).run()));
                    let _ = done.send((shard, res.ok()));
                });
            }
            scope.join_all();
        });
        drop(send);

        for (shard, out) in recv {
            let out = out.ok_or_else(|| Error::execution(format!("reduce shard {} panicked", shard)))?;
            outputs[shard] = Some(out);
        }

        outputs
            .into_iter()
            .enumerate()
            .map(|(shard, out)| {
                out.ok_or_else(|| Error::execution(format!("reduce shard {} did not report", shard)))
            })
            .collect()
    }
}
