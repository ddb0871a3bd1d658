/*!
 * Ordered, append-only persistence for one translation output.
 *
 * Workers finish in any order; the writer buffers results by index and only
 * appends a line once every earlier line is on disk, so the file is always a
 * gapless prefix of the final output.
 */

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::JobError;
use crate::file_utils::FileManager;

pub struct OrderedWriter {
    path: PathBuf,
    file: File,
    next: usize,
    pending: BTreeMap<usize, String>,
    written: usize,
}

impl OrderedWriter {
    /// Open `path` for appending; the first line this writer expects has index `next`.
    /// With `truncate`, existing content is discarded.
    pub fn open(path: &Path, next: usize, truncate: bool) -> Result<Self, JobError> {
        let file = FileManager::open_append(path, truncate).map_err(|e| JobError::persistence(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            next,
            pending: BTreeMap::new(),
            written: 0,
        })
    }

    /// Accept the line for `index` and flush every line that is now contiguous.
    /// Returns how many lines reached the file.
    pub fn push(&mut self, index: usize, line: String) -> Result<usize, JobError> {
        if index < self.next {
            return Ok(0);
        }
        self.pending.insert(index, line);

        let mut flushed = 0;
        while let Some(line) = self.pending.remove(&self.next) {
            writeln!(self.file, "{}", line).map_err(|e| JobError::persistence(&self.path, e))?;
            self.file.flush().map_err(|e| JobError::persistence(&self.path, e))?;
            self.next += 1;
            flushed += 1;
        }
        self.written += flushed;
        Ok(flushed)
    }

    /// Index of the first line not yet on disk
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Lines held back waiting for an earlier index
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Lines this writer appended
    pub fn written(&self) -> usize {
        self.written
    }
}
