//! An in-memory result sink, for library users that want the table rather than files.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::phases::output::ResultSink;

/// Part handle handed out by [`MemorySink`].
pub struct MemoryPart(Rc<RefCell<Vec<u8>>>);

impl io::Write for MemoryPart {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collects output parts in memory. Nothing is visible before [`ResultSink::commit`].
#[derive(Default)]
pub struct MemorySink {
    staged: BTreeMap<String, Rc<RefCell<Vec<u8>>>>,
    committed: Option<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Names of the committed parts, sorted.
    pub fn part_names(&self) -> Vec<String> {
        self.committed
            .as_ref()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All committed parts concatenated in name order, or `None` if the job did not commit.
    pub fn output(&self) -> Option<String> {
        let parts = self.committed.as_ref()?;
        let mut out = String::new();
        for data in parts.values() {
            out.push_str(&String::from_utf8_lossy(data));
        }
        Some(out)
    }
}

impl ResultSink for MemorySink {
    type Part = MemoryPart;

    fn open_part(&mut self, name: &str) -> Result<MemoryPart> {
        if self.committed.is_some() {
            return Err(Error::execution("sink already committed"));
        }
        let buf = Rc::new(RefCell::new(Vec::new()));
        if self.staged.insert(String::from(name), buf.clone()).is_some() {
            return Err(Error::execution(format!("output part {} opened twice", name)));
        }
        Ok(MemoryPart(buf))
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed.is_some() {
            return Err(Error::execution("sink already committed"));
        }
        let staged = std::mem::take(&mut self.staged);
        let parts = staged
            .into_iter()
            .map(|(name, buf)| (name, buf.take()))
            .collect();
        self.committed = Some(parts);
        Ok(())
    }

    fn abort(&mut self) {
        self.staged.clear();
    }
}
