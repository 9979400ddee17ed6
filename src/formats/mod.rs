//! Output formats.

pub mod fake;
pub mod lines;
