//! Implements the Map phase.
//!

use tracing::debug;

use crate::combine::{combine, CombineStats};
use crate::error::Result;
use crate::merge::SortedRuns;
use crate::parameters::MRParameters;
use crate::record_types::{range_shard, SharderF};
use crate::split::Partition;
use crate::tokenize::tokenize_partition;

/// Counters for one finished map partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapStats {
    pub bytes: u64,
    pub records: u64,
    pub tokens: u64,
    pub distinct: u64,
}

/// This is the unit of work of the mapping phase: one partition is tokenized, combined
/// and cut into sorted runs, one per key shard. Mapper threads run on this; nothing in it
/// is shared with any other partition.
pub struct MapPartition {
    params: MRParameters,
    partition: Partition,
    sharder: SharderF,
}

impl MapPartition {
    pub fn new(params: MRParameters, partition: Partition) -> MapPartition {
        MapPartition {
            params,
            partition,
            sharder: range_shard,
        }
    }

    /// Default: `range_shard`
    pub fn set_sharder(mut self, sharder: SharderF) -> MapPartition {
        self.sharder = sharder;
        self
    }

    pub fn run(self) -> Result<(SortedRuns, MapStats)> {
        let mut tokens = tokenize_partition(&self.partition)?;
        let (partial, CombineStats { tokens: n, distinct }) =
            combine(self.partition.index, tokens.by_ref())?;

        let stats = MapStats {
            bytes: self.partition.len,
            records: tokens.records_read(),
            tokens: n,
            distinct,
        };
        debug!(
            partition = self.partition.index,
            offset = self.partition.offset,
            len = self.partition.len,
            records = stats.records,
            tokens = stats.tokens,
            distinct = stats.distinct,
            "map partition done"
        );

        let runs = SortedRuns::from_partial(partial, self.params.reducers, self.sharder);
        Ok((runs, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::split_file;
    use std::fs;

    #[test]
    fn test_map_partition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "abc def\nxy yz za\nhello world\nlet's do this\nfoo bar baz abc\n").unwrap();

        let reducers = 3;
        let params = MRParameters::new().set_concurrency(1, reducers);
        let parts = split_file(&path, 1 << 20, 0).unwrap();
        assert_eq!(parts.len(), 1);

        let (runs, stats) = MapPartition::new(params, parts[0].clone()).run().unwrap();
        assert_eq!(runs.partition(), 0);
        assert_eq!(runs.shards(), reducers);
        assert_eq!(stats.records, 5);
        assert_eq!(stats.tokens, 14);
        assert_eq!(stats.distinct, 13);
        assert_eq!(runs.total(), 14);
    }

    #[test]
    fn test_map_partition_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "a a\nb b\nc c\n").unwrap();

        let parts = split_file(&path, 4, 0).unwrap();
        assert_eq!(parts.len(), 3);

        let (runs, stats) = MapPartition::new(MRParameters::new(), parts[1].clone()).run().unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(runs.total(), 2);
        assert_eq!(runs.runs()[0][0].word, "b");
    }
}
