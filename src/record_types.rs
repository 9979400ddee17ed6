//! Values passed between the phases of a job.

use std::collections::hash_map;

use fnv::FnvHashMap;

/// A (word,count) pair. Ordered by word first, so sorted runs of these
/// keep equal words adjacent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

impl WordCount {
    pub fn new(word: String, count: u64) -> WordCount {
        WordCount { word, count }
    }
}

/// Per-word counts produced by the combiner for one partition.
#[derive(Clone, Debug, Default)]
pub struct PartialCount {
    partition: usize,
    counts: FnvHashMap<String, u64>,
}

impl PartialCount {
    pub fn new(partition: usize) -> PartialCount {
        PartialCount {
            partition,
            counts: FnvHashMap::default(),
        }
    }

    /// Index of the partition these counts were taken from.
    pub fn partition(&self) -> usize {
        self.partition
    }

    pub fn add(&mut self, word: String, n: u64) {
        *self.counts.entry(word).or_insert(0) += n;
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.counts.get(word).copied()
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum over all counts, i.e. the number of tokens that went into this table.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, u64> {
        self.counts.iter()
    }

    /// Splits the table into `n` runs, each sorted by word, placing every word in the
    /// run chosen by `sharder`.
    pub fn into_sorted_runs(self, n: usize, sharder: SharderF) -> Vec<Vec<WordCount>> {
        let mut runs: Vec<Vec<WordCount>> = (0..n).map(|_| Vec::new()).collect();
        for (word, count) in self.counts {
            let shard = sharder(n, &word);
            runs[shard].push(WordCount::new(word, count));
        }
        for run in runs.iter_mut() {
            run.sort_unstable();
        }
        runs
    }
}

/// A word and the counts contributed for it by each partition that contained it,
/// in partition order. Can be iterated over in a `for` loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedGroup {
    word: String,
    counts: Vec<u64>,
}

impl MergedGroup {
    pub fn new(word: String, counts: Vec<u64>) -> MergedGroup {
        MergedGroup { word, counts }
    }

    /// Retrieves the key of the group.
    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn into_word(self) -> String {
        self.word
    }
}

impl IntoIterator for MergedGroup {
    type Item = u64;
    type IntoIter = std::vec::IntoIter<u64>;
    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

/// A function used to determine the key shard a word belongs in.
/// The first argument is the number of shards, the second one the word;
/// the return value is in [0; n).
pub type SharderF = fn(usize, &str) -> usize;

const ALPHABET_LEN: usize = 36;

/// Position of a token byte in `0-9a-z`. Bytes outside the alphabet are clamped to its ends.
fn alphabet_index(b: u8) -> usize {
    match b {
        b'0'..=b'9' => (b - b'0') as usize,
        b'a'..=b'z' => 10 + (b - b'a') as usize,
        _ if b < b'0' => 0,
        _ => ALPHABET_LEN - 1,
    }
}

/// Default sharding function: assigns ranges of the key space by the first byte of the word.
/// Monotonic in word order, so shard `i` only holds words that sort before the words of
/// shard `i+1`.
pub fn range_shard(n: usize, word: &str) -> usize {
    let idx = word.bytes().next().map(alphabet_index).unwrap_or(0);
    idx * n / ALPHABET_LEN
}
