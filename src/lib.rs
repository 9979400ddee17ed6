//! Counts word frequencies with a mapreduce process bounded to one machine.
//!
//! The input is cut into line-aligned partitions which are tokenized and combined in
//! parallel; the partial tables meet at a single merge barrier, are reduced per key shard
//! and committed as one sorted `<word>\t<count>` table.
//!

pub mod combine;
pub mod controller;
pub mod error;
pub mod formats;
pub mod map;
pub mod merge;
pub mod parameters;
pub mod phases;
pub mod record_types;
pub mod reduce;
pub mod shard_merge;
pub mod split;
pub mod tokenize;

pub use controller::{JobCounters, JobReport, JobState, MRController};
pub use error::{Error, Result};
pub use parameters::MRParameters;
