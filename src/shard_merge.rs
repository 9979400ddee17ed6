//! Balanced binary merge tree joining the per-partition runs of one key shard.
//!
//! Used by the merger to interleave `Contribution` runs, each sorted by (word, partition),
//! into the single ordered stream that is then grouped by word.

use std::iter;

/// One node of the tree: yields the smaller head of its two children. Children are boxed,
/// since a node may sit on top of a run or of another node.
///
/// Ties are resolved in favour of the left input, so items comparing equal keep the order of
/// the sources they came from.
pub struct ShardMergeIterator<'a, T: PartialOrd> {
    left: Box<dyn Iterator<Item = T> + 'a>,
    right: Box<dyn Iterator<Item = T> + 'a>,

    left_peeked: Option<T>,
    right_peeked: Option<T>,
}

impl<'a, T: PartialOrd> Iterator for ShardMergeIterator<'a, T> {
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        // fill up
        if self.left_peeked.is_none() {
            self.left_peeked = self.left.next();
        }
        if self.right_peeked.is_none() {
            self.right_peeked = self.right.next();
        }

        // Consume the smaller peeked value
        let take_left = match (&self.left_peeked, &self.right_peeked) {
            (None, None) => return None,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(l), Some(r)) => l <= r,
        };
        if take_left {
            self.left_peeked.take()
        } else {
            self.right_peeked.take()
        }
    }
}

impl<'a, T: PartialOrd + 'a> ShardMergeIterator<'a, T> {
    fn pair(
        left: Box<dyn Iterator<Item = T> + 'a>,
        right: Box<dyn Iterator<Item = T> + 'a>,
    ) -> ShardMergeIterator<'a, T> {
        ShardMergeIterator {
            left,
            right,
            left_peeked: None,
            right_peeked: None,
        }
    }

    fn empty() -> ShardMergeIterator<'a, T> {
        ShardMergeIterator::pair(Box::new(iter::empty()), Box::new(iter::empty()))
    }

    /// Builds the tree over `sources`, each of which must already be sorted. The result yields
    /// every item of every source in sorted order.
    pub fn build<It, Srcs>(sources: Srcs) -> ShardMergeIterator<'a, T>
    where
        It: Iterator<Item = T> + 'a,
        Srcs: IntoIterator<Item = It>,
    {
        let mut sources = sources.into_iter();
        let mut merged: Vec<ShardMergeIterator<'a, T>> = Vec::new();

        // Leaves: one node per pair of neighbouring runs.
        while let Some(src1) = sources.next() {
            let right: Box<dyn Iterator<Item = T> + 'a> = match sources.next() {
                None => Box::new(iter::empty()),
                Some(src2) => Box::new(src2),
            };
            merged.push(ShardMergeIterator::pair(Box::new(src1), right));
        }

        // Inner nodes, up to the root.
        ShardMergeIterator::merge(merged)
    }

    /// Joins nodes by halving the list. Left halves stay on the left, preserving source order on
    /// ties.
    fn merge(mut its: Vec<ShardMergeIterator<'a, T>>) -> ShardMergeIterator<'a, T> {
        match its.len() {
            0 => ShardMergeIterator::empty(),
            1 => its.remove(0),
            _ => {
                let right = its.split_off(its.len() / 2);
                ShardMergeIterator::pair(
                    Box::new(ShardMergeIterator::merge(its)),
                    Box::new(ShardMergeIterator::merge(right)),
                )
            }
        }
    }
}
