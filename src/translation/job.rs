/*!
 * Translation job types.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::corpus::Corpus;

static PAIR_STEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<src>[^_\s]+(?:_[^_\s]+)*?)_to_(?P<dst>[^\s]+)$").expect("valid pair regex"));

/// One translation direction, displayed as `{src}_to_{dst}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguagePairKey {
    pub source: String,
    pub target: String,
}

impl LanguagePairKey {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Parse a `{src}_to_{dst}` identifier, e.g. a translation file stem
    pub fn parse(id: &str) -> Option<Self> {
        let captures = PAIR_STEM.captures(id)?;
        Some(Self::new(&captures["src"], &captures["dst"]))
    }

    /// Parse the pair from a translation file path (`eng_to_ur.txt`)
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem().and_then(|s| s.to_str()).and_then(Self::parse)
    }

    /// Column header and file stem
    pub fn id(&self) -> String {
        format!("{}_to_{}", self.source, self.target)
    }

    /// Output file name for this direction
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.id())
    }
}

impl fmt::Display for LanguagePairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_to_{}", self.source, self.target)
    }
}

/// Everything the runner needs for one (backend, direction) run
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub backend_id: String,
    pub pair: LanguagePairKey,
    pub corpus: Arc<Corpus>,
    pub output_path: PathBuf,
}

impl TranslationJob {
    pub fn new(
        backend_id: impl Into<String>,
        pair: LanguagePairKey,
        corpus: Arc<Corpus>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            pair,
            corpus,
            output_path: output_path.into(),
        }
    }

    /// Label used in logs and progress bars
    pub fn label(&self) -> String {
        format!("{}:{}", self.backend_id, self.pair)
    }
}

/// How a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Output was already complete; no backend calls
    Skipped,
    /// Translated from scratch
    Completed,
    /// A partial output was completed
    Resumed,
    /// Stopped early; the written prefix can be resumed
    Cancelled,
}

impl JobStatus {
    /// Whether the output on disk is complete and can be scored
    pub fn is_complete(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Result of running one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub status: JobStatus,
    /// Lines already on disk before this run
    pub lines_reused: usize,
    /// Lines appended by this run
    pub lines_written: usize,
    /// Lines written as sentinel errors
    pub failed_lines: usize,
    /// Backend calls made, retries included
    pub backend_calls: usize,
}

impl JobOutcome {
    pub fn skipped(lines_reused: usize) -> Self {
        Self {
            status: JobStatus::Skipped,
            lines_reused,
            lines_written: 0,
            failed_lines: 0,
            backend_calls: 0,
        }
    }
}
