//! Divides input sources into line-aligned byte ranges ("partitions") that are
//! processed independently by the map phase.
//!
//! Boundaries are found by advancing a candidate boundary by the maximum partition
//! size and then scanning forward to the next `\n`. A partition therefore only exceeds
//! the maximum size to reach the end of the line it would otherwise cut, and no line is
//! ever split across two partitions.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

/// A contiguous, line-aligned byte range of one source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    pub source: Arc<Path>,
    pub offset: u64,
    pub len: u64,
}

impl Partition {
    /// Offset one past the last byte of this partition.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// Opens the source and returns a reader limited to this partition's bytes.
    pub fn open(&self) -> Result<io::Take<BufReader<fs::File>>> {
        let f = fs::File::open(&self.source).map_err(|e| Error::input(&*self.source, e))?;
        let mut r = BufReader::new(f);
        r.seek(SeekFrom::Start(self.offset))
            .map_err(|e| Error::input(&*self.source, e))?;
        Ok(r.take(self.len))
    }
}

/// Hidden files are skipped when a directory is given as input.
fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Expands input locations into the list of sources to read. A directory contributes its
/// regular, non-hidden files in name order (non-recursive).
pub fn list_sources(locations: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    for loc in locations {
        let meta = fs::metadata(loc).map_err(|e| Error::input(loc, e))?;
        if !meta.is_dir() {
            sources.push(loc.clone());
            continue;
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(loc).map_err(|e| Error::input(loc, e))? {
            let entry = entry.map_err(|e| Error::input(loc, e))?;
            let path = entry.path();
            if is_hidden(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let ty = entry.file_type().map_err(|e| Error::input(&path, e))?;
            if ty.is_file() || (ty.is_symlink() && path.is_file()) {
                files.push(path);
            }
        }
        files.sort();
        sources.extend(files);
    }
    Ok(sources)
}

/// Scans forward from `pos` and returns the offset right after the next `\n`,
/// or `size` if the source ends first.
fn next_line_end<R: BufRead + Seek>(r: &mut R, pos: u64, size: u64) -> io::Result<u64> {
    r.seek(SeekFrom::Start(pos))?;
    let mut end = pos;
    loop {
        let (found, used) = {
            let buf = match r.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            match buf.iter().position(|&b| b == b'\n') {
                Some(i) => (true, i + 1),
                None => (buf.is_empty(), buf.len()),
            }
        };
        r.consume(used);
        end += used as u64;
        if found || end >= size {
            return Ok(end.min(size));
        }
    }
}

/// Computes the partition boundaries for one readable source of length `size`.
/// Partitions are numbered starting at `first_index`.
pub fn split_reader<R: BufRead + Seek>(
    source: &Arc<Path>,
    r: &mut R,
    size: u64,
    max_partition_size: u64,
    first_index: usize,
) -> Result<Vec<Partition>> {
    let mut partitions = Vec::new();
    let mut start = 0;

    while start < size {
        let candidate = start.saturating_add(max_partition_size);
        let end = if candidate >= size {
            size
        } else {
            // The last byte of the window may itself be the terminator.
            next_line_end(r, candidate - 1, size).map_err(|e| Error::input(&**source, e))?
        };

        partitions.push(Partition {
            index: first_index + partitions.len(),
            source: source.clone(),
            offset: start,
            len: end - start,
        });
        start = end;
    }
    Ok(partitions)
}

/// Splits one source file. An empty file yields no partitions.
pub fn split_file(path: &Path, max_partition_size: u64, first_index: usize) -> Result<Vec<Partition>> {
    let f = fs::File::open(path).map_err(|e| Error::input(path, e))?;
    let size = f.metadata().map_err(|e| Error::input(path, e))?.len();
    let source: Arc<Path> = Arc::from(path);
    let mut r = BufReader::new(f);

    let partitions = split_reader(&source, &mut r, size, max_partition_size, first_index)?;
    debug!(source = %path.display(), size, partitions = partitions.len(), "split source");
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn split_bytes(data: &[u8], max: u64) -> Vec<Partition> {
        let source: Arc<Path> = Arc::from(Path::new("mem"));
        let mut c = Cursor::new(data.to_vec());
        split_reader(&source, &mut c, data.len() as u64, max, 0).unwrap()
    }

    fn slice<'a>(data: &'a [u8], p: &Partition) -> &'a [u8] {
        &data[p.offset as usize..p.end() as usize]
    }

    const TEXT: &[u8] = b"the cat sat\nthe dog sat on the mat\n\nsome more lines\nx\nlast line without newline";

    #[test]
    fn test_split_covers_input() {
        for max in 1..=(TEXT.len() as u64 + 3) {
            let parts = split_bytes(TEXT, max);
            let mut joined = Vec::new();
            let mut expected_offset = 0;
            for (i, p) in parts.iter().enumerate() {
                assert_eq!(p.index, i);
                assert_eq!(p.offset, expected_offset);
                assert!(p.len > 0);
                expected_offset = p.end();
                joined.extend_from_slice(slice(TEXT, p));
            }
            assert_eq!(joined, TEXT);
        }
    }

    #[test]
    fn test_boundaries_on_line_ends() {
        for max in 1..=(TEXT.len() as u64) {
            let parts = split_bytes(TEXT, max);
            for p in &parts[..parts.len() - 1] {
                assert_eq!(TEXT[p.end() as usize - 1], b'\n', "max={}", max);
            }
            // Every line lies within one partition.
            let mut line_start = 0;
            for line in TEXT.split(|&b| b == b'\n') {
                let line_end = line_start + line.len();
                let owner = parts
                    .iter()
                    .find(|p| p.offset as usize <= line_start && line_start < p.end() as usize);
                if let Some(p) = owner {
                    assert!(line_end <= p.end() as usize);
                }
                line_start = line_end + 1;
            }
        }
    }

    #[test]
    fn test_partition_size_bound() {
        let data = b"aaaa\nbbbb\ncccc\ndddd\n";
        let parts = split_bytes(data, 5);
        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| p.len == 5));

        // Window ends mid-line: partition extends to the end of that line.
        let parts = split_bytes(data, 7);
        assert_eq!(parts[0].len, 10);
    }

    #[test]
    fn test_long_line_single_partition() {
        let data = b"one very long line without any newline at all";
        let parts = split_bytes(data, 4);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len, data.len() as u64);
    }

    #[test]
    fn test_line_end_scan_stops_at_newline() {
        let mut data = vec![b'x'; 64 * 1024];
        data.push(b'\n');
        data.extend_from_slice(b"tail\n");
        let size = data.len() as u64;
        let mut r = BufReader::with_capacity(16, Cursor::new(data));

        assert_eq!(next_line_end(&mut r, 10, size).unwrap(), 64 * 1024 + 1);
        assert_eq!(next_line_end(&mut r, 64 * 1024 + 2, size).unwrap(), size);
        assert_eq!(next_line_end(&mut r, size, size).unwrap(), size);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_bytes(b"", 10).is_empty());
    }

    #[test]
    fn test_split_file_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        fs::File::create(&path).unwrap().write_all(TEXT).unwrap();

        let parts = split_file(&path, 16, 0).unwrap();
        let mut joined = Vec::new();
        for p in &parts {
            p.open().unwrap().read_to_end(&mut joined).unwrap();
        }
        assert_eq!(joined, TEXT);
    }

    #[test]
    fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let res = list_sources(&[dir.path().join("nope")]);
        assert!(matches!(res, Err(Error::Input { .. })));
    }

    #[test]
    fn test_directory_sources() {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in [
            ("b.txt", "b b\n"),
            ("a.txt", "a\n"),
            ("_SUCCESS", ""),
            (".hidden", "secret\n"),
            ("empty.txt", ""),
        ] {
            fs::write(dir.path().join(name), content).unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();

        let sources = list_sources(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "empty.txt"]);

        let mut parts = Vec::new();
        for source in &sources {
            parts.append(&mut split_file(source, 1024, parts.len()).unwrap());
        }
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].index, 1);
        assert!(parts[1].source.ends_with("b.txt"));
    }
}
