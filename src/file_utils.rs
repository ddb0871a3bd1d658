use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Find files with a specific extension directly inside a directory, sorted by name
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let wanted = extension.trim_start_matches('.');
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
            {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// List the immediate subdirectories of a directory, sorted by name
    pub fn list_dirs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            if entry.file_type().is_dir() {
                result.push(entry.path().to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a UTF-8 text file as trimmed lines, keeping empty lines
    pub fn read_lines<P: AsRef<Path>>(path: P) -> io::Result<Vec<String>> {
        let content = fs::read_to_string(path)?;
        Ok(content.lines().map(|line| line.trim().to_string()).collect())
    }

    /// Count the lines of a text file; a missing file has zero lines
    pub fn count_lines<P: AsRef<Path>>(path: P) -> io::Result<usize> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut count = 0;
        for line in BufReader::new(file).lines() {
            line?;
            count += 1;
        }
        Ok(count)
    }

    /// Open a file for appending, creating it and its parent directory if needed
    pub fn open_append<P: AsRef<Path>>(path: P, truncate: bool) -> io::Result<File> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent)?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        options.open(path)
    }

    /// Cut an unterminated last line left by an interrupted write.
    /// Returns whether anything was removed; a missing file is left alone.
    pub fn truncate_partial_line<P: AsRef<Path>>(path: P) -> io::Result<bool> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if bytes.last().is_none_or(|b| *b == b'\n') {
            return Ok(false);
        }

        let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |pos| pos + 1);
        OpenOptions::new().write(true).open(path)?.set_len(keep as u64)?;
        Ok(true)
    }
}
