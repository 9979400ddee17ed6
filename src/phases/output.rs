//! Persisting the final counts. Output is committed at job level: either every part and the
//! success marker become visible together, or nothing does.

use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::formats::lines::LinesWriter;
use crate::parameters::MRParameters;
use crate::record_types::WordCount;

/// Name of the empty marker file written into a committed output directory.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// A type implementing ResultSink receives the output of the reduce phase. `open_part` is
/// called once per key shard, in shard order; nothing written may be presented as a result
/// until `commit` succeeds. After `abort` no output may be visible.
pub trait ResultSink {
    type Part: io::Write;

    /// Return a new handle for the output unit `name`.
    fn open_part(&mut self, name: &str) -> Result<Self::Part>;

    /// Publish every part written so far.
    fn commit(&mut self) -> Result<()>;

    /// Discard everything written so far. Must be safe to call more than once.
    fn abort(&mut self);
}

/// Writes the reduced shards as `<word>\t<count>` lines, one output unit per shard.
/// Returns the number of records written.
pub fn write_output<S: ResultSink>(
    sink: &mut S,
    params: &MRParameters,
    shards: &[Vec<WordCount>],
) -> Result<u64> {
    let mut written = 0;

    for (shard, counts) in shards.iter().enumerate() {
        let name = params.part_name(shard);
        let mut w = LinesWriter::new(sink.open_part(&name)?);
        for wc in counts {
            w.write_count(wc).map_err(|e| write_failed(&name, e))?;
        }
        written += w.records_written();
        w.finish().map_err(|e| write_failed(&name, e))?;
        debug!(part = %name, records = counts.len(), "wrote output part");
    }
    Ok(written)
}

fn write_failed(name: &str, e: io::Error) -> Error {
    Error::execution(format!("writing output part {}: {}", name, e))
}

/// Writes parts into a hidden staging directory next to the output location and renames it
/// onto the output location on commit.
pub struct DirectorySink {
    output: PathBuf,
    staging: PathBuf,
    staged: bool,
    committed: bool,
}

impl DirectorySink {
    /// Fails with a configuration error if the output location already exists or has no
    /// file name. Nothing is created on disk until the first part is opened.
    pub fn new(output: &Path) -> Result<DirectorySink> {
        if output.exists() {
            return Err(Error::config(format!(
                "output location {} already exists",
                output.display()
            )));
        }
        let name = output.file_name().ok_or_else(|| {
            Error::config(format!("invalid output location {}", output.display()))
        })?;

        let mut staging_name = std::ffi::OsString::from(".");
        staging_name.push(name);
        staging_name.push("._temporary");

        Ok(DirectorySink {
            output: output.to_path_buf(),
            staging: output.with_file_name(staging_name),
            staged: false,
            committed: false,
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    fn stage(&mut self) -> Result<()> {
        if self.staged {
            return Ok(());
        }
        if self.staging.exists() {
            warn!(staging = %self.staging.display(), "removing stale staging directory");
            fs::remove_dir_all(&self.staging).map_err(|e| self.io_failed("clearing", e))?;
        }
        fs::create_dir_all(&self.staging).map_err(|e| self.io_failed("creating", e))?;
        self.staged = true;
        Ok(())
    }

    fn io_failed(&self, what: &str, e: io::Error) -> Error {
        Error::execution(format!("{} {}: {}", what, self.staging.display(), e))
    }
}

impl ResultSink for DirectorySink {
    type Part = BufWriter<fs::File>;

    fn open_part(&mut self, name: &str) -> Result<Self::Part> {
        if self.committed {
            return Err(Error::execution("output already committed"));
        }
        self.stage()?;
        let path = self.staging.join(name);
        let f = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::execution(format!("opening {}: {}", path.display(), e)))?;
        Ok(BufWriter::new(f))
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(Error::execution("output already committed"));
        }
        self.stage()?;
        fs::File::create(self.staging.join(SUCCESS_MARKER))
            .and_then(|f| f.sync_all())
            .map_err(|e| self.io_failed("writing success marker in", e))?;

        if self.output.exists() {
            return Err(Error::execution(format!(
                "output location {} appeared while the job was running",
                self.output.display()
            )));
        }
        fs::rename(&self.staging, &self.output).map_err(|e| self.io_failed("committing", e))?;

        self.committed = true;
        info!(output = %self.output.display(), "output committed");
        Ok(())
    }

    fn abort(&mut self) {
        if self.committed || !self.staged {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(staging = %self.staging.display(), "could not remove staging directory: {}", e);
            }
        }
        self.staged = false;
    }
}

impl Drop for DirectorySink {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fake::MemorySink;

    fn counts(words: &[(&str, u64)]) -> Vec<WordCount> {
        words
            .iter()
            .map(|(w, c)| WordCount::new(String::from(*w), *c))
            .collect()
    }

    #[test]
    fn test_write_output_to_memory() {
        let mut sink = MemorySink::new();
        let params = MRParameters::new();
        let shards = vec![counts(&[("cat", 1), ("dog", 1)]), vec![], counts(&[("the", 3)])];

        assert_eq!(write_output(&mut sink, &params, &shards).unwrap(), 3);
        sink.commit().unwrap();
        assert_eq!(
            sink.part_names(),
            vec!["part-r-00000", "part-r-00001", "part-r-00002"]
        );
        assert_eq!(sink.output().unwrap(), "cat\t1\ndog\t1\nthe\t3\n");
    }

    #[test]
    fn test_directory_commit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = DirectorySink::new(&out).unwrap();
        assert!(!sink.staging().exists());

        let shards = vec![counts(&[("a", 2)]), counts(&[("z", 1)])];
        write_output(&mut sink, &MRParameters::new(), &shards).unwrap();
        assert!(sink.staging().exists());
        assert!(!out.exists());

        sink.commit().unwrap();
        assert!(!sink.staging().exists());
        assert!(out.join(SUCCESS_MARKER).exists());
        assert_eq!(fs::read_to_string(out.join("part-r-00000")).unwrap(), "a\t2\n");
        assert_eq!(fs::read_to_string(out.join("part-r-00001")).unwrap(), "z\t1\n");

        // Dropping a committed sink leaves the output alone.
        drop(sink);
        assert!(out.exists());
    }

    #[test]
    fn test_directory_abort() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let staging;
        {
            let mut sink = DirectorySink::new(&out).unwrap();
            staging = sink.staging().to_path_buf();
            write_output(&mut sink, &MRParameters::new(), &[counts(&[("a", 1)])]).unwrap();
            assert!(staging.exists());
            // dropped without commit
        }
        assert!(!staging.exists());
        assert!(!out.exists());

        let mut sink = DirectorySink::new(&out).unwrap();
        sink.open_part("part-r-00000").unwrap();
        sink.abort();
        sink.abort();
        assert!(!out.exists());
        assert!(!sink.staging().exists());
    }

    #[test]
    fn test_existing_output_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DirectorySink::new(dir.path()),
            Err(Error::Configuration(_))
        ));
    }
}
