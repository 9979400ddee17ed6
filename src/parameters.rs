//! Parameters for a word count job.
//!

use crate::error::{Error, Result};

/// Default upper bound for the size of one map partition: 128 MiB.
pub const DEFAULT_MAX_PARTITION_SIZE: u64 = 128 * 1024 * 1024;

/// Upper bound for the number of reducers, and so of key shards and output units.
pub const MAX_REDUCERS: usize = 1024;

#[derive(Clone, Debug)]
pub struct MRParameters {
    pub mappers: usize,
    pub reducers: usize,

    pub max_partition_size: u64,

    pub output_part_prefix: String,
}

impl Default for MRParameters {
    fn default() -> MRParameters {
        MRParameters::new()
    }
}

impl MRParameters {
    pub fn new() -> MRParameters {
        MRParameters {
            mappers: 4,
            reducers: 1,
            max_partition_size: DEFAULT_MAX_PARTITION_SIZE,
            output_part_prefix: String::from("part-r-"),
        }
    }

    /// Determines how many threads are used in each phase. Mappers and reducers do not run at
    /// the same time (the reducers need to wait for every map output). The number of reducers
    /// also determines the number of key shards, and so the number of output units.
    ///
    /// Default 4/1
    pub fn set_concurrency(mut self, mappers: usize, reducers: usize) -> MRParameters {
        self.mappers = mappers;
        self.reducers = reducers;
        self
    }

    /// Upper bound for the byte length of one map partition. A partition only grows past this
    /// to reach the end of the line it would otherwise cut. A whole partition's distinct words
    /// are held in memory by one mapper at a time, so RAM divided by `mappers` is the limit.
    ///
    /// Default 128 MiB
    pub fn set_max_partition_size(mut self, size: u64) -> MRParameters {
        self.max_partition_size = size;
        self
    }

    /// Prefix for output units produced by the reduce phase.
    /// Default: part-r- (the zero-padded id of the key shard is appended)
    pub fn set_out_name(mut self, prefix: String) -> MRParameters {
        self.output_part_prefix = prefix;
        self
    }

    /// Name of the output unit holding key shard `shard`.
    pub fn part_name(&self, shard: usize) -> String {
        format!("{}{:05}", self.output_part_prefix, shard)
    }

    /// Rejects parameter combinations no job can run with.
    pub fn validate(&self) -> Result<()> {
        if self.mappers == 0 {
            return Err(Error::config("at least one mapper is required"));
        }
        if self.reducers == 0 {
            return Err(Error::config("at least one reducer is required"));
        }
        if self.reducers > MAX_REDUCERS {
            return Err(Error::config(format!(
                "{} reducers requested, at most {} are supported",
                self.reducers, MAX_REDUCERS
            )));
        }
        if self.max_partition_size == 0 {
            return Err(Error::config("maximum partition size must be positive"));
        }
        if self.output_part_prefix.is_empty()
            || self.output_part_prefix.contains(std::path::is_separator)
        {
            return Err(Error::config(format!(
                "invalid output part prefix {:?}",
                self.output_part_prefix
            )));
        }
        Ok(())
    }
}
