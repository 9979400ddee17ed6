//! Implements the Reduce phase.
//!

use tracing::debug;

use crate::merge::ShardInput;
use crate::record_types::{MergedGroup, WordCount};

/// Sums the contributions of one group into its final count.
pub fn reduce(group: MergedGroup) -> WordCount {
    let total = group.counts().iter().sum();
    WordCount::new(group.into_word(), total)
}

/// Reduces one key shard: every merged group of the shard becomes one final count,
/// in word order.
pub struct ReducePartition {
    input: ShardInput,
}

impl ReducePartition {
    pub fn new(input: ShardInput) -> ReducePartition {
        ReducePartition { input }
    }

    /// Run the Reduce partition.
    pub fn run(self) -> Vec<WordCount> {
        let shard = self.input.shard();
        let out: Vec<WordCount> = self.input.groups().map(reduce).collect();
        debug!(shard, words = out.len(), "reduce shard done");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Merger;
    use crate::record_types::{range_shard, PartialCount};

    #[test]
    fn test_reduce_sums() {
        let wc = reduce(MergedGroup::new(String::from("sat"), vec![1, 1]));
        assert_eq!(wc, WordCount::new(String::from("sat"), 2));

        let wc = reduce(MergedGroup::new(String::from("the"), vec![3, 0, 9]));
        assert_eq!(wc.count, 12);
    }

    #[test]
    fn test_reduce_partition() {
        let mut m = Merger::new(2, 2);
        let mut a = PartialCount::new(0);
        a.add(String::from("zeta"), 2);
        a.add(String::from("alpha"), 1);
        let mut b = PartialCount::new(1);
        b.add(String::from("zeta"), 3);
        b.add(String::from("beta"), 4);
        m.accept_partial(b, range_shard).unwrap();
        m.accept_partial(a, range_shard).unwrap();

        let outputs: Vec<Vec<WordCount>> = m
            .finish()
            .unwrap()
            .into_iter()
            .map(|input| ReducePartition::new(input).run())
            .collect();

        assert_eq!(
            outputs[0],
            vec![
                WordCount::new(String::from("alpha"), 1),
                WordCount::new(String::from("beta"), 4)
            ]
        );
        assert_eq!(outputs[1], vec![WordCount::new(String::from("zeta"), 5)]);
    }
}
