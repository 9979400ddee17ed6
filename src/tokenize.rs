//! Turns the lines of a partition into normalized words.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::vec;

use crate::error::{Error, Result};
use crate::split::Partition;

/// Strips every byte outside `[A-Za-z0-9 ]` from a record and lowercases the rest.
/// Bytes are treated as characters, so tabs and non-ASCII bytes are dropped as well.
pub fn normalize(record: &[u8]) -> String {
    record
        .iter()
        .filter(|b| b.is_ascii_alphanumeric() || **b == b' ')
        .map(|b| b.to_ascii_lowercase() as char)
        .collect()
}

/// Splits one record into tokens, left to right.
pub fn tokenize_record(record: &[u8]) -> Vec<String> {
    normalize(record)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Splits one `\n`-terminated line into records. A lone `\r` also ends a record; `\r\n`
/// is a single terminator.
fn records(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line.split(|&b| b == b'\r')
}

/// Lazy, single-pass iterator over the tokens of a line-oriented source.
/// Read failures are yielded once, after which the iterator is exhausted.
pub struct Tokens<R: BufRead> {
    src: R,
    path: PathBuf,
    line: Vec<u8>,
    pending: vec::IntoIter<String>,
    records: u64,
    done: bool,
}

impl<R: BufRead> Tokens<R> {
    /// `path` is only used to report errors.
    pub fn new(src: R, path: &Path) -> Tokens<R> {
        Tokens {
            src,
            path: path.to_path_buf(),
            line: Vec::new(),
            pending: Vec::new().into_iter(),
            records: 0,
            done: false,
        }
    }

    /// How many records have been read so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Reads the next record into the pending token buffer. Returns false at end of input.
    fn fill(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .src
            .read_until(b'\n', &mut self.line)
            .map_err(|e| Error::input(&self.path, e))?;
        if n == 0 {
            return Ok(false);
        }
        let mut pending = Vec::new();
        for record in records(&self.line) {
            self.records += 1;
            pending.extend(tokenize_record(record));
        }
        self.pending = pending.into_iter();
        Ok(true)
    }
}

impl<R: BufRead> Iterator for Tokens<R> {
    type Item = Result<String>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(t) = self.pending.next() {
                return Some(Ok(t));
            }
            if self.done {
                return None;
            }
            match self.fill() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Opens a partition and returns its token stream.
pub fn tokenize_partition(p: &Partition) -> Result<Tokens<impl BufRead>> {
    Ok(Tokens::new(p.open()?, &p.source))
}
