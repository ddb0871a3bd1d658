/*!
 * Runs one translation job with resumable, ordered persistence.
 *
 * Source lines become index-keyed work items translated by a bounded pool of
 * concurrent calls. Results go through an `OrderedWriter`, so the output file
 * is a gapless prefix at every point and a later run can resume from it.
 */

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::app_config::{BackendConfig, EmptyLinePolicy, ResumePolicy, RunnerConfig};
use crate::errors::{JobError, TranslationError};
use crate::file_utils::FileManager;
use crate::translation::backend::TranslationBackend;
use crate::translation::concurrency::{CancellationFlag, RequestLimiter};
use crate::translation::job::{JobOutcome, JobStatus, TranslationJob};
use crate::translation::retry::RetryPolicy;
use crate::translation::writer::OrderedWriter;

/// Prefix of lines that stand in for a failed translation
pub const SENTINEL_PREFIX: &str = "Error: ";

/// Collapse multi-line text onto one line so output stays index aligned
pub fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Output line recorded for a line that could not be translated
pub fn sentinel(error: &TranslationError) -> String {
    format!("{}{}", SENTINEL_PREFIX, single_line(error.message()))
}

/// Per-job knobs, resolved from the runner and backend configuration
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub resume_policy: ResumePolicy,
    pub empty_lines: EmptyLinePolicy,
    pub concurrent_requests: usize,
    pub retry: RetryPolicy,
}

impl RunnerSettings {
    pub fn from_config(runner: &RunnerConfig, backend: &BackendConfig) -> Self {
        Self {
            resume_policy: runner.resume_policy,
            empty_lines: runner.empty_lines,
            concurrent_requests: backend.concurrent_requests.max(1),
            retry: RetryPolicy::from_config(runner, backend.timeout_secs),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            resume_policy: ResumePolicy::default(),
            empty_lines: EmptyLinePolicy::default(),
            concurrent_requests: 4,
            retry: RetryPolicy::default(),
        }
    }
}

enum LineResult {
    Translated(String),
    Failed(String),
    Cancelled,
}

pub struct TranslationRunner {
    backend: Arc<dyn TranslationBackend>,
    limiter: RequestLimiter,
    cancel: CancellationFlag,
    settings: RunnerSettings,
    progress: ProgressBar,
}

impl TranslationRunner {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        limiter: RequestLimiter,
        cancel: CancellationFlag,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            backend,
            limiter,
            cancel,
            settings,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress on `bar` instead of a hidden one
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Work items in output order; `None` is an empty line written without a call
    fn work_items(&self, job: &TranslationJob) -> Vec<Option<String>> {
        let lines = job.corpus.lines().iter();
        match self.settings.empty_lines {
            EmptyLinePolicy::Skip => lines.filter(|l| !l.is_empty()).map(|l| Some(l.clone())).collect(),
            EmptyLinePolicy::Preserve => lines
                .map(|l| if l.is_empty() { None } else { Some(l.clone()) })
                .collect(),
        }
    }

    /// Decide how much of the existing output to keep.
    /// Returns `Ok(None)` when the job is already done.
    fn resume_point(&self, job: &TranslationJob, expected: usize) -> Result<Option<(usize, bool)>, JobError> {
        let path = &job.output_path;
        match self.settings.resume_policy {
            ResumePolicy::Force => Ok(Some((0, true))),
            ResumePolicy::TrustExisting => {
                let existing = FileManager::count_lines(path).map_err(|e| JobError::persistence(path, e))?;
                if existing > 0 {
                    Ok(None)
                } else {
                    Ok(Some((0, true)))
                }
            }
            ResumePolicy::ValidateLineCount => {
                if FileManager::truncate_partial_line(path).map_err(|e| JobError::persistence(path, e))? {
                    warn!("{}: dropped an unterminated last line in {}", job.label(), path.display());
                }
                let existing = FileManager::count_lines(path).map_err(|e| JobError::persistence(path, e))?;
                if existing > expected {
                    return Err(JobError::StaleOutput {
                        path: path.clone(),
                        found: existing,
                        expected,
                    });
                }
                if existing == expected && FileManager::file_exists(path) {
                    return Ok(None);
                }
                Ok(Some((existing, false)))
            }
        }
    }

    /// Translate whatever part of `job` is not yet on disk
    pub async fn run(&self, job: &TranslationJob) -> Result<JobOutcome, JobError> {
        let items = self.work_items(job);
        let expected = items.len();
        self.progress.set_length(expected as u64);

        let (existing, truncate) = match self.resume_point(job, expected)? {
            Some(point) => point,
            None => {
                let existing = FileManager::count_lines(&job.output_path)
                    .map_err(|e| JobError::persistence(&job.output_path, e))?;
                info!("{}: output already complete ({} lines), skipping", job.label(), existing);
                self.progress.set_position(existing as u64);
                return Ok(JobOutcome::skipped(existing));
            }
        };

        if existing > 0 {
            info!(
                "{}: resuming at line {} of {}",
                job.label(),
                existing + 1,
                expected
            );
        } else {
            info!("{}: translating {} lines with {}", job.label(), expected, self.backend.id());
        }
        self.progress.set_position(existing as u64);

        let mut writer = OrderedWriter::open(&job.output_path, existing, truncate)?;
        let calls = Arc::new(AtomicUsize::new(0));
        let mut failed_lines = 0;
        let mut cancelled = self.cancel.is_cancelled();

        if !cancelled {
            let source = job.pair.source.as_str();
            let target = job.pair.target.as_str();
            let retry = self.settings.retry;

            let mut results = stream::iter(items.into_iter().enumerate().skip(existing))
                .map(|(index, text)| {
                    let backend = Arc::clone(&self.backend);
                    let limiter = self.limiter.clone();
                    let cancel = self.cancel.clone();
                    let calls = Arc::clone(&calls);

                    async move {
                        let Some(text) = text else {
                            return (index, LineResult::Translated(String::new()));
                        };
                        if cancel.is_cancelled() {
                            return (index, LineResult::Cancelled);
                        }
                        let Some(_permit) = limiter.acquire().await else {
                            return (index, LineResult::Cancelled);
                        };
                        if cancel.is_cancelled() {
                            return (index, LineResult::Cancelled);
                        }

                        let result = retry
                            .run(|| {
                                calls.fetch_add(1, Ordering::SeqCst);
                                backend.translate(&text, source, target)
                            })
                            .await;

                        match result {
                            Ok(translated) => (index, LineResult::Translated(single_line(&translated))),
                            Err(error) => (index, LineResult::Failed(sentinel(&error))),
                        }
                    }
                })
                .buffer_unordered(self.settings.concurrent_requests.max(1));

            while let Some((index, result)) = results.next().await {
                let line = match result {
                    LineResult::Translated(line) => line,
                    LineResult::Failed(line) => {
                        warn!("{}: line {} failed: {}", job.label(), index + 1, line);
                        failed_lines += 1;
                        line
                    }
                    LineResult::Cancelled => {
                        cancelled = true;
                        continue;
                    }
                };

                let flushed = writer.push(index, line)?;
                self.progress.inc(flushed as u64);
            }
        }

        let written = writer.written();
        let backend_calls = calls.load(Ordering::SeqCst);
        let status = if cancelled || writer.next_index() < expected {
            if writer.pending() > 0 {
                debug!("{}: discarding {} lines past the first gap", job.label(), writer.pending());
            }
            JobStatus::Cancelled
        } else if existing > 0 {
            JobStatus::Resumed
        } else {
            JobStatus::Completed
        };

        match status {
            JobStatus::Cancelled => warn!(
                "{}: cancelled after {} of {} lines; rerun to resume",
                job.label(),
                writer.next_index(),
                expected
            ),
            _ => info!(
                "{}: wrote {} lines ({} failed, {} backend calls)",
                job.label(),
                written,
                failed_lines,
                backend_calls
            ),
        }

        Ok(JobOutcome {
            status,
            lines_reused: existing,
            lines_written: written,
            failed_lines,
            backend_calls,
        })
    }
}
