//! Plain text output: one `<word>\t<count>` line per final count.

use std::io;
use std::io::Write;

use crate::record_types::WordCount;

/// Writer that terminates every record with a `'\n'` character.
pub struct LinesWriter<W: io::Write> {
    dest: W,
    records_written: u64,
}

impl<W: io::Write> LinesWriter<W> {
    pub fn new(dest: W) -> LinesWriter<W> {
        LinesWriter {
            dest,
            records_written: 0,
        }
    }

    /// Writes one `<word>\t<count>` line.
    pub fn write_count(&mut self, wc: &WordCount) -> io::Result<()> {
        writeln!(self.dest, "{}\t{}", wc.word, wc.count)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.dest.flush()?;
        Ok(self.dest)
    }
}

/// Parses a line as written by [`LinesWriter::write_count`]. Returns `None` for anything else.
pub fn parse_count_line(line: &str) -> Option<WordCount> {
    let (word, count) = line.split_once('\t')?;
    if word.is_empty() || count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(WordCount::new(String::from(word), count.parse().ok()?))
}
