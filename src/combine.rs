//! The combiner: sums word occurrences within one partition before anything crosses
//! the merge barrier.

use crate::error::Result;
use crate::record_types::PartialCount;

/// Counters collected while combining one partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CombineStats {
    pub tokens: u64,
    pub distinct: u64,
}

/// Consumes a token stream and sums the occurrences of each distinct word.
/// The first read error aborts the partition.
pub fn combine<I>(partition: usize, tokens: I) -> Result<(PartialCount, CombineStats)>
where
    I: IntoIterator<Item = Result<String>>,
{
    let mut partial = PartialCount::new(partition);
    let mut n = 0;

    for token in tokens {
        partial.add(token?, 1);
        n += 1;
    }

    let stats = CombineStats {
        tokens: n,
        distinct: partial.len() as u64,
    };
    Ok((partial, stats))
}
