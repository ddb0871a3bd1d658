use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{error, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{BackendConfig, BackendType, Config, EmptyLinePolicy, ResumePolicy};
use crate::corpus::{Corpus, CorpusStore};
use crate::errors::JobError;
use crate::file_utils::FileManager;
use crate::scoring::engine::{ScoreSeries, ScoringEngine};
use crate::scoring::report::{ReportAggregator, ReportPaths};
use crate::scoring::similarity::{create_similarity, SimilarityBackend};
use crate::translation::backend::{create_backend, LanguageNames, TranslationBackend};
use crate::translation::concurrency::{CancellationFlag, RequestLimiter};
use crate::translation::job::{JobOutcome, JobStatus, LanguagePairKey, TranslationJob};
use crate::translation::runner::{RunnerSettings, TranslationRunner};

// @module: Run orchestration across backends and language pairs

/// A configured backend together with its runner settings
#[derive(Clone)]
pub struct BackendEntry {
    pub backend: Arc<dyn TranslationBackend>,
    pub settings: RunnerSettings,
}

/// Outcome of one (backend, pair) translation job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub backend_id: String,
    pub pair: LanguagePairKey,
    pub outcome: JobOutcome,
}

/// A job or report step that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub backend_id: String,
    pub pair: Option<LanguagePairKey>,
    pub message: String,
}

impl JobFailure {
    fn new(backend_id: &str, pair: Option<&LanguagePairKey>, message: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            pair: pair.cloned(),
            message: message.into(),
        }
    }

    pub fn label(&self) -> String {
        match &self.pair {
            Some(pair) => format!("{}:{}", self.backend_id, pair),
            None => self.backend_id.clone(),
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub jobs: Vec<JobRecord>,
    pub reports: Vec<(String, ReportPaths)>,
    pub failures: Vec<JobFailure>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn job(&self, backend_id: &str, pair: &LanguagePairKey) -> Option<&JobOutcome> {
        self.jobs
            .iter()
            .find(|j| j.backend_id == backend_id && &j.pair == pair)
            .map(|j| &j.outcome)
    }

    pub fn report(&self, backend_id: &str) -> Option<&ReportPaths> {
        self.reports.iter().find(|(id, _)| id == backend_id).map(|(_, paths)| paths)
    }

    /// Log the end-of-run overview
    pub fn log(&self) {
        let failed_lines: usize = self.jobs.iter().map(|j| j.outcome.failed_lines).sum();
        let calls: usize = self.jobs.iter().map(|j| j.outcome.backend_calls).sum();
        info!(
            "Run finished: {} jobs, {} reports, {} backend calls, {} lines degraded to errors",
            self.jobs.len(),
            self.reports.len(),
            calls,
            failed_lines
        );
        if self.cancelled {
            warn!("Run was cancelled; rerun the same command to resume");
        }
        for failure in &self.failures {
            error!("{} failed: {}", failure.label(), failure.message);
        }
    }
}

/// Drives translation, scoring and reporting for every configured backend
pub struct Orchestrator {
    // @field: App configuration
    config: Config,
    store: Arc<CorpusStore>,
    backends: Vec<BackendEntry>,
    similarity: Arc<dyn SimilarityBackend>,
    limiter: RequestLimiter,
    cancel: CancellationFlag,
    progress: MultiProgress,
}

impl Orchestrator {
    /// Build backends and the similarity backend from configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let languages = LanguageNames::from_languages(&config.languages);
        let mut backends = Vec::with_capacity(config.backends.len());
        for backend_config in &config.backends {
            let backend = create_backend(backend_config, languages.clone())
                .with_context(|| format!("Failed to create backend '{}'", backend_config.id()))?;
            backends.push(BackendEntry {
                backend,
                settings: RunnerSettings::from_config(&config.runner, backend_config),
            });
        }

        let similarity = create_similarity(&config.scoring.similarity).context("Failed to create similarity backend")?;
        Ok(Self::with_backends(config, backends, similarity))
    }

    /// Use explicit backends instead of building them from configuration
    pub fn with_backends(config: Config, backends: Vec<BackendEntry>, similarity: Arc<dyn SimilarityBackend>) -> Self {
        let store = Arc::new(CorpusStore::new(&config.corpus_root, &config.corpus_extension));
        let limiter = RequestLimiter::new(config.runner.max_global_requests);
        Self {
            config,
            store,
            backends,
            similarity,
            limiter,
            cancel: CancellationFlag::new(),
            progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Runner settings for a backend built outside the configuration
    pub fn entry(config: &Config, backend: Arc<dyn TranslationBackend>) -> BackendEntry {
        let backend_config = config
            .backends
            .iter()
            .find(|b| b.id() == backend.id())
            .cloned()
            .unwrap_or_else(|| BackendConfig::new(BackendType::Mock));
        BackendEntry {
            settings: RunnerSettings::from_config(&config.runner, &backend_config),
            backend,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Draw progress bars on the terminal
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Discard existing outputs and translate everything again
    pub fn with_force(mut self, force: bool) -> Self {
        if force {
            for entry in &mut self.backends {
                entry.settings.resume_policy = ResumePolicy::Force;
            }
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Global request cap shared by every job; closing it stops queued calls
    pub fn request_limiter(&self) -> RequestLimiter {
        self.limiter.clone()
    }

    fn backend_dir(&self, backend_id: &str) -> PathBuf {
        self.config.translated_root.join(backend_id)
    }

    fn pairs(&self) -> Vec<LanguagePairKey> {
        self.config
            .language_pairs
            .iter()
            .map(|p| LanguagePairKey::new(&p.source, &p.target))
            .collect()
    }

    /// Lines a translation of `corpus` is compared against
    fn original_view(&self, corpus: &Corpus) -> Vec<String> {
        match self.config.runner.empty_lines {
            EmptyLinePolicy::Skip => corpus.non_empty_view(),
            EmptyLinePolicy::Preserve => corpus.lines().to_vec(),
        }
    }

    fn job_bar(&self, label: &str) -> ProgressBar {
        let bar = self.progress.add(ProgressBar::new(0));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("█▓▒░"));
        bar.set_message(label.to_string());
        bar
    }

    /// Backends x pairs; a missing source corpus fails only the jobs needing it
    fn plan(&self, summary: &mut RunSummary) -> Vec<(usize, TranslationJob)> {
        let mut corpora = HashMap::new();
        for language in self.config.source_languages() {
            let loaded = self.store.get_or_load(&language).map_err(|e| e.to_string());
            if let Err(e) = &loaded {
                warn!("{}", e);
            }
            corpora.insert(language, loaded);
        }

        let mut jobs = Vec::new();
        for (index, entry) in self.backends.iter().enumerate() {
            let backend_id = entry.backend.id();
            for pair in self.pairs() {
                if !entry.backend.supports(&pair.source, &pair.target) {
                    info!("{}: no model for {}, skipping", backend_id, pair);
                    continue;
                }
                match corpora.get(&pair.source) {
                    Some(Ok(corpus)) => {
                        let output = self.backend_dir(backend_id).join(pair.file_name());
                        jobs.push((index, TranslationJob::new(backend_id, pair, Arc::clone(corpus), output)));
                    }
                    Some(Err(e)) => summary.failures.push(JobFailure::new(backend_id, Some(&pair), e.clone())),
                    None => summary.failures.push(JobFailure::new(
                        backend_id,
                        Some(&pair),
                        format!("Corpus not loaded for language '{}'", pair.source),
                    )),
                }
            }
        }
        jobs
    }

    /// Translate every planned job, resuming earlier output
    pub async fn translate(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        let jobs = self.plan(&mut summary);
        info!(
            "Running {} translation jobs across {} backends",
            jobs.len(),
            self.backends.len()
        );

        let results: Vec<(TranslationJob, Result<JobOutcome, JobError>)> = stream::iter(jobs)
            .map(|(index, job)| {
                let entry = &self.backends[index];
                let bar = self.job_bar(&job.label());
                let runner = TranslationRunner::new(
                    Arc::clone(&entry.backend),
                    self.limiter.clone(),
                    self.cancel.clone(),
                    entry.settings,
                )
                .with_progress(bar.clone());

                async move {
                    let result = runner.run(&job).await;
                    bar.finish();
                    (job, result)
                }
            })
            .buffer_unordered(self.config.runner.max_concurrent_jobs.max(1))
            .collect()
            .await;

        for (job, result) in results {
            match result {
                Ok(outcome) => {
                    if outcome.status == JobStatus::Cancelled {
                        summary.cancelled = true;
                    }
                    summary.jobs.push(JobRecord {
                        backend_id: job.backend_id,
                        pair: job.pair,
                        outcome,
                    });
                }
                Err(e) => summary
                    .failures
                    .push(JobFailure::new(&job.backend_id, Some(&job.pair), e.to_string())),
            }
        }

        // Keep configuration order regardless of completion order
        let order = |backend_id: &str, pair: &LanguagePairKey| {
            let b = self.backends.iter().position(|e| e.backend.id() == backend_id);
            let p = self.config.language_pairs.iter().position(|c| c.source == pair.source && c.target == pair.target);
            (b, p)
        };
        summary.jobs.sort_by_key(|j| order(&j.backend_id, &j.pair));
        summary
    }

    async fn score_pair(&self, engine: &ScoringEngine, pair: &LanguagePairKey, path: &Path) -> Result<ScoreSeries, JobError> {
        let corpus = self.store.get_or_load(&pair.source)?;
        let original = self.original_view(&corpus);
        engine.score_file(pair, &original, path).await
    }

    fn write_report(&self, aggregator: ReportAggregator, dir: &Path, summary: &mut RunSummary) {
        if aggregator.is_empty() {
            return;
        }
        let report = aggregator.build();
        let backend_id = report.backend_id().to_string();
        match report.write(dir) {
            Ok(paths) => summary.reports.push((backend_id, paths)),
            Err(e) => summary.failures.push(JobFailure::new(&backend_id, None, e.to_string())),
        }
    }

    fn engine(&self) -> ScoringEngine {
        ScoringEngine::new(Arc::clone(&self.similarity), self.config.scoring.concurrent_requests)
    }

    /// Translate, then score every complete output and write one report per backend
    pub async fn run(&self) -> RunSummary {
        let mut summary = self.translate().await;
        if summary.cancelled || self.cancel.is_cancelled() {
            warn!("Cancelled; skipping scoring");
            summary.cancelled = true;
            return summary;
        }

        let engine = self.engine();
        for entry in &self.backends {
            let backend_id = entry.backend.id();
            let mut aggregator =
                ReportAggregator::new(backend_id, engine.similarity_id(), self.config.scoring.precision);

            for record in summary.jobs.iter().filter(|j| j.backend_id == backend_id) {
                if !record.outcome.status.is_complete() {
                    continue;
                }
                let path = self.backend_dir(backend_id).join(record.pair.file_name());
                match self.score_pair(&engine, &record.pair, &path).await {
                    Ok(series) => aggregator.add(series),
                    Err(e) => summary
                        .failures
                        .push(JobFailure::new(backend_id, Some(&record.pair), e.to_string())),
                }
            }

            self.write_report(aggregator, &self.backend_dir(backend_id), &mut summary);
        }
        summary
    }

    /// Score whatever translations exist under the translated root
    pub async fn score_existing(&self) -> Result<RunSummary> {
        let root = &self.config.translated_root;
        let dirs = FileManager::list_dirs(root)
            .with_context(|| format!("Failed to list translation directories in {:?}", root))?;
        let engine = self.engine();
        let mut summary = RunSummary::default();

        for dir in dirs {
            let Some(backend_id) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let mut aggregator =
                ReportAggregator::new(&backend_id, engine.similarity_id(), self.config.scoring.precision);

            for path in FileManager::find_files(&dir, ".txt")? {
                let Some(pair) = LanguagePairKey::from_path(&path) else {
                    warn!("Skipping {:?}: name is not {{src}}_to_{{dst}}.txt", path);
                    continue;
                };
                info!("Scoring {}:{}", backend_id, pair);
                match self.score_pair(&engine, &pair, &path).await {
                    Ok(series) => aggregator.add(series),
                    Err(e) => summary.failures.push(JobFailure::new(&backend_id, Some(&pair), e.to_string())),
                }
            }

            self.write_report(aggregator, &dir, &mut summary);
        }
        Ok(summary)
    }
}
