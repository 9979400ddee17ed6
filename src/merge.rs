//! The merge barrier: collects the partial tables of all partitions and groups them by word.
//!
//! Contributions are kept by partition index, never by arrival order, and every key shard
//! is merged through a [`ShardMergeIterator`] over per-partition sorted runs. The groups a
//! merger yields are therefore the same whatever order the partitions finished in.

use std::collections::BTreeMap;
use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::record_types::{MergedGroup, PartialCount, SharderF, WordCount};
use crate::shard_merge::ShardMergeIterator;

/// The partial table of one partition, cut into one sorted run per key shard.
#[derive(Clone, Debug)]
pub struct SortedRuns {
    partition: usize,
    runs: Vec<Vec<WordCount>>,
}

impl SortedRuns {
    pub fn from_partial(partial: PartialCount, shards: usize, sharder: SharderF) -> SortedRuns {
        SortedRuns {
            partition: partial.partition(),
            runs: partial.into_sorted_runs(shards, sharder),
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    pub fn shards(&self) -> usize {
        self.runs.len()
    }

    pub fn runs(&self) -> &[Vec<WordCount>] {
        &self.runs
    }

    /// Sum of all counts in all runs.
    pub fn total(&self) -> u64 {
        self.runs.iter().flatten().map(|wc| wc.count).sum()
    }
}

/// One partition's count for a word. Ordered by word, then partition, so a merged stream
/// lists a word's contributions in partition order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Contribution {
    word: String,
    partition: usize,
    count: u64,
}

/// Collects [`SortedRuns`] from every dispatched partition.
pub struct Merger {
    shards: usize,
    expected: usize,
    received: BTreeMap<usize, Vec<Vec<WordCount>>>,
}

impl Merger {
    /// `expected` is the number of partitions that were dispatched; `shards` the number of
    /// key shards each of them was cut into.
    pub fn new(expected: usize, shards: usize) -> Merger {
        Merger {
            shards,
            expected,
            received: BTreeMap::new(),
        }
    }

    /// Number of partitions that have reported so far.
    pub fn received(&self) -> usize {
        self.received.len()
    }

    /// Accepts the output of one partition. Arrival order does not matter.
    pub fn accept(&mut self, runs: SortedRuns) -> Result<()> {
        if runs.partition >= self.expected {
            return Err(Error::execution(format!(
                "partition {} reported, but only {} were dispatched",
                runs.partition, self.expected
            )));
        }
        if runs.runs.len() != self.shards {
            return Err(Error::execution(format!(
                "partition {} reported {} shards, expected {}",
                runs.partition,
                runs.runs.len(),
                self.shards
            )));
        }
        if self.received.insert(runs.partition, runs.runs).is_some() {
            return Err(Error::execution(format!(
                "partition {} reported twice",
                runs.partition
            )));
        }
        Ok(())
    }

    /// Shorthand for accepting an unsharded partial table.
    pub fn accept_partial(&mut self, partial: PartialCount, sharder: SharderF) -> Result<()> {
        let shards = self.shards;
        self.accept(SortedRuns::from_partial(partial, shards, sharder))
    }

    /// Passes the barrier. Fails unless every dispatched partition has reported; returns
    /// one input per key shard, in shard order.
    pub fn finish(self) -> Result<Vec<ShardInput>> {
        if self.received.len() != self.expected {
            return Err(Error::execution(format!(
                "merge barrier reached with {} of {} partitions reported",
                self.received.len(),
                self.expected
            )));
        }

        let mut inputs: Vec<ShardInput> = (0..self.shards)
            .map(|shard| ShardInput {
                shard,
                runs: Vec::with_capacity(self.expected),
            })
            .collect();

        for (partition, runs) in self.received {
            for (shard, run) in runs.into_iter().enumerate() {
                if !run.is_empty() {
                    inputs[shard].runs.push((partition, run));
                }
            }
        }
        Ok(inputs)
    }
}

/// All partitions' sorted runs for one key shard.
#[derive(Debug)]
pub struct ShardInput {
    shard: usize,
    runs: Vec<(usize, Vec<WordCount>)>,
}

impl ShardInput {
    pub fn shard(&self) -> usize {
        self.shard
    }

    /// Merges the runs and groups equal words. Groups come out sorted by word.
    pub fn groups(self) -> MergedGroups {
        let sources = self.runs.into_iter().map(|(partition, run)| {
            run.into_iter().map(move |wc| Contribution {
                word: wc.word,
                partition,
                count: wc.count,
            })
        });
        MergedGroups::new(ShardMergeIterator::build(sources))
    }
}

/// Iterator adapter: Converts a sorted stream of contributions into [`MergedGroup`]s by
/// grouping subsequent contributions with identical word.
pub struct MergedGroups {
    it: Peekable<ShardMergeIterator<'static, Contribution>>,
}

impl MergedGroups {
    fn new(it: ShardMergeIterator<'static, Contribution>) -> MergedGroups {
        MergedGroups { it: it.peekable() }
    }
}

impl Iterator for MergedGroups {
    type Item = MergedGroup;
    fn next(&mut self) -> Option<Self::Item> {
        let first = self.it.next()?;
        let word = first.word;
        let mut counts = vec![first.count];

        while let Some(c) = self.it.next_if(|c| c.word == word) {
            counts.push(c.count);
        }

        Some(MergedGroup::new(word, counts))
    }
}

/// Walks the groups of all key shards, shard after shard, i.e. in global word order.
pub fn collect_groups(inputs: Vec<ShardInput>) -> impl Iterator<Item = MergedGroup> {
    inputs.into_iter().flat_map(ShardInput::groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_types::range_shard;

    fn partial(partition: usize, words: &[(&str, u64)]) -> PartialCount {
        let mut pc = PartialCount::new(partition);
        for (w, n) in words {
            pc.add(String::from(*w), *n);
        }
        pc
    }

    fn partials() -> Vec<PartialCount> {
        vec![
            partial(0, &[("the", 2), ("cat", 1), ("sat", 1)]),
            partial(1, &[("the", 1), ("dog", 1), ("zoo", 4)]),
            partial(2, &[]),
            partial(3, &[("cat", 5), ("1st", 1), ("the", 7)]),
        ]
    }

    fn merge_in_order(order: &[usize], shards: usize) -> Vec<MergedGroup> {
        let all = partials();
        let mut m = Merger::new(all.len(), shards);
        for &i in order {
            m.accept_partial(all[i].clone(), range_shard).unwrap();
        }
        collect_groups(m.finish().unwrap()).collect()
    }

    #[test]
    fn test_groups_sorted_and_complete() {
        let groups = merge_in_order(&[0, 1, 2, 3], 1);
        let words: Vec<&str> = groups.iter().map(|g| g.word()).collect();
        assert_eq!(words, vec!["1st", "cat", "dog", "sat", "the", "zoo"]);

        let the = groups.iter().find(|g| g.word() == "the").unwrap();
        assert_eq!(the.counts(), &[2, 1, 7]);
        let cat = groups.iter().find(|g| g.word() == "cat").unwrap();
        assert_eq!(cat.counts(), &[1, 5]);
    }

    #[test]
    fn test_arrival_order_invariant() {
        let expected = merge_in_order(&[0, 1, 2, 3], 1);
        for order in [[3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1]] {
            assert_eq!(merge_in_order(&order, 1), expected);
        }
        // The shard count only changes how the key space is cut, not the groups.
        for shards in [2, 5, 36, 40] {
            assert_eq!(merge_in_order(&[3, 1, 0, 2], shards), expected);
        }
    }

    #[test]
    fn test_barrier_requires_all_partitions() {
        let mut m = Merger::new(3, 1);
        m.accept_partial(partial(0, &[("a", 1)]), range_shard).unwrap();
        m.accept_partial(partial(2, &[("a", 1)]), range_shard).unwrap();
        assert_eq!(m.received(), 2);
        assert!(matches!(m.finish(), Err(Error::JobExecution(_))));
    }

    #[test]
    fn test_rejects_duplicates_and_strangers() {
        let mut m = Merger::new(2, 1);
        m.accept_partial(partial(0, &[]), range_shard).unwrap();
        assert!(m.accept_partial(partial(0, &[]), range_shard).is_err());
        assert!(m.accept_partial(partial(5, &[]), range_shard).is_err());

        let mut m = Merger::new(1, 2);
        let runs = SortedRuns::from_partial(partial(0, &[("a", 1)]), 3, range_shard);
        assert!(m.accept(runs).is_err());
    }

    #[test]
    fn test_no_partitions() {
        let inputs = Merger::new(0, 3).finish().unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(collect_groups(inputs).count(), 0);
    }
}
