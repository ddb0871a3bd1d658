/*!
 * Tests for the resumable translation runner
 */

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use truthscore::app_config::{EmptyLinePolicy, ResumePolicy};
use truthscore::corpus::Corpus;
use truthscore::errors::JobError;
use truthscore::providers::mock::MockProvider;
use truthscore::translation::{
    CancellationFlag, JobStatus, LanguagePairKey, MockBackend, RequestLimiter, RetryPolicy, RunnerSettings,
    TranslationBackend, TranslationJob, TranslationRunner,
};

use crate::common::{self, CancellingBackend, JitteryBackend};

fn settings(resume_policy: ResumePolicy, empty_lines: EmptyLinePolicy, concurrent_requests: usize) -> RunnerSettings {
    RunnerSettings {
        resume_policy,
        empty_lines,
        concurrent_requests,
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_secs(2)),
    }
}

fn job(dir: &Path, lines: &[&str]) -> TranslationJob {
    TranslationJob::new(
        "mock",
        LanguagePairKey::new("eng", "ur"),
        Arc::new(Corpus::from_lines("eng", lines.to_vec())),
        dir.join("mock").join("eng_to_ur.txt"),
    )
}

fn runner(backend: Arc<dyn TranslationBackend>, settings: RunnerSettings) -> TranslationRunner {
    TranslationRunner::new(backend, RequestLimiter::new(8), CancellationFlag::new(), settings)
}

fn default_settings() -> RunnerSettings {
    settings(ResumePolicy::ValidateLineCount, EmptyLinePolicy::Skip, 4)
}

#[tokio::test]
async fn test_run_withOutOfOrderCompletion_shouldKeepIndexAlignment() {
    common::init_logger();
    let dir = common::create_temp_dir().unwrap();
    let lines = ["a", "bb bb", "ccc", "dddd dd", "e", "ffffff", "gg", "hhhhhhhhh", "i i", "jjjj"];
    let job = job(dir.path(), &lines);
    let backend = Arc::new(JitteryBackend::new());

    let outcome = runner(backend.clone(), settings(ResumePolicy::ValidateLineCount, EmptyLinePolicy::Skip, 5))
        .run(&job)
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.lines_written, lines.len());
    assert_eq!(backend.calls(), lines.len());
    let expected: Vec<String> = lines.iter().map(|l| l.to_uppercase()).collect();
    assert_eq!(common::read_lines(&job.output_path), expected);
}

#[tokio::test]
async fn test_run_withSkipPolicy_shouldDropEmptyLines() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["hello", "", "world"]);
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let outcome = runner(backend.clone(), default_settings()).run(&job).await.unwrap();

    assert_eq!(common::read_lines(&job.output_path), vec!["hello", "world"]);
    assert_eq!(outcome.backend_calls, 2);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_run_withPreservePolicy_shouldWriteEmptyLinesWithoutCalls() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["hello", "", "world"]);
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let outcome = runner(backend.clone(), settings(ResumePolicy::ValidateLineCount, EmptyLinePolicy::Preserve, 2))
        .run(&job)
        .await
        .unwrap();

    assert_eq!(common::read_lines(&job.output_path), vec!["hello", "", "world"]);
    assert_eq!(outcome.lines_written, 3);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_run_twice_shouldSkipWithoutCallsAndKeepFileIdentical() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two", "three"]);
    let backend = Arc::new(MockBackend::new("mock", MockProvider::working()));

    runner(backend.clone(), default_settings()).run(&job).await.unwrap();
    let before = fs::read(&job.output_path).unwrap();
    let calls_before = backend.calls();

    let outcome = runner(backend.clone(), default_settings()).run(&job).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Skipped);
    assert_eq!(outcome.backend_calls, 0);
    assert_eq!(backend.calls(), calls_before);
    assert_eq!(fs::read(&job.output_path).unwrap(), before);
}

#[tokio::test]
async fn test_run_withPrefixOutput_shouldTranslateOnlyMissingLines() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "", "two", "three", "four"]);
    fs::create_dir_all(job.output_path.parent().unwrap()).unwrap();
    fs::write(&job.output_path, "kept one\nkept two\n").unwrap();
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let outcome = runner(backend.clone(), default_settings()).run(&job).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Resumed);
    assert_eq!(outcome.lines_reused, 2);
    assert_eq!(outcome.lines_written, 2);
    assert_eq!(backend.calls(), 2);
    assert_eq!(
        common::read_lines(&job.output_path),
        vec!["kept one", "kept two", "three", "four"]
    );
}

#[tokio::test]
async fn test_run_withUnterminatedLastLine_shouldRedoThatLine() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two", "three"]);
    fs::create_dir_all(job.output_path.parent().unwrap()).unwrap();
    fs::write(&job.output_path, "one\ntw").unwrap();
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let outcome = runner(backend.clone(), default_settings()).run(&job).await.unwrap();

    assert_eq!(outcome.lines_reused, 1);
    assert_eq!(common::read_lines(&job.output_path), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_run_withLongerOutput_shouldFailAsStale() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two"]);
    fs::create_dir_all(job.output_path.parent().unwrap()).unwrap();
    fs::write(&job.output_path, "a\nb\nc\n").unwrap();
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let error = runner(backend.clone(), default_settings()).run(&job).await.unwrap_err();

    assert!(matches!(error, JobError::StaleOutput { found: 3, expected: 2, .. }));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_run_withForce_shouldRetranslateEverything() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two"]);
    fs::create_dir_all(job.output_path.parent().unwrap()).unwrap();
    fs::write(&job.output_path, "a\nb\nc\n").unwrap();
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let outcome = runner(backend.clone(), settings(ResumePolicy::Force, EmptyLinePolicy::Skip, 2))
        .run(&job)
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(common::read_lines(&job.output_path), vec!["one", "two"]);
}

#[tokio::test]
async fn test_run_withTrustExisting_shouldSkipAnyNonEmptyOutput() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two", "three"]);
    fs::create_dir_all(job.output_path.parent().unwrap()).unwrap();
    fs::write(&job.output_path, "partial\n").unwrap();
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let outcome = runner(backend.clone(), settings(ResumePolicy::TrustExisting, EmptyLinePolicy::Skip, 2))
        .run(&job)
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Skipped);
    assert_eq!(backend.calls(), 0);
    assert_eq!(common::read_lines(&job.output_path), vec!["partial"]);
}

#[tokio::test]
async fn test_run_withTransientFailures_shouldRetryAndSucceed() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["only line"]);
    let backend = Arc::new(MockBackend::new("mock", MockProvider::fail_first(2)));

    let outcome = runner(backend.clone(), default_settings()).run(&job).await.unwrap();

    assert_eq!(outcome.failed_lines, 0);
    assert_eq!(outcome.backend_calls, 3);
    assert_eq!(common::read_lines(&job.output_path), vec!["only line"]);
}

#[tokio::test]
async fn test_run_withPermanentFailures_shouldWriteSentinelsWithoutRetrying() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two"]);
    let backend = Arc::new(MockBackend::new("mock", MockProvider::rejecting()));

    let outcome = runner(backend.clone(), default_settings()).run(&job).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.failed_lines, 2);
    assert_eq!(backend.calls(), 2);
    let lines = common::read_lines(&job.output_path);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("Error: ")));
}

#[tokio::test]
async fn test_run_withPersistentOutage_shouldDegradeAfterRetries() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one"]);
    let backend = Arc::new(MockBackend::new("mock", MockProvider::failing()));
    let mut settings = default_settings();
    settings.retry = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_secs(1));

    let outcome = runner(backend.clone(), settings).run(&job).await.unwrap();

    assert_eq!(outcome.failed_lines, 1);
    assert_eq!(backend.calls(), 3);
    assert!(common::read_lines(&job.output_path)[0].starts_with("Error: "));
}

#[tokio::test]
async fn test_run_withSlowBackend_shouldTimeOutIntoSentinel() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one"]);
    let backend = Arc::new(MockBackend::new("mock", MockProvider::slow(1_000)));
    let mut settings = default_settings();
    settings.retry = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(20));

    let outcome = runner(backend.clone(), settings).run(&job).await.unwrap();

    assert_eq!(outcome.failed_lines, 1);
    assert_eq!(backend.calls(), 2);
    let line = &common::read_lines(&job.output_path)[0];
    assert!(line.starts_with("Error: ") && line.contains("timed out"), "{}", line);
}

#[tokio::test]
async fn test_run_withMultilineTranslation_shouldStayOnOneLine() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two"]);
    let provider = MockProvider::working().with_custom_response(|req| format!("{}\nsecond line", req.text));
    let backend = Arc::new(MockBackend::new("mock", provider));

    runner(backend, default_settings()).run(&job).await.unwrap();

    assert_eq!(
        common::read_lines(&job.output_path),
        vec!["one second line", "two second line"]
    );
}

#[tokio::test]
async fn test_run_whenCancelled_shouldLeavePrefixThatResumes() {
    let dir = common::create_temp_dir().unwrap();
    let lines = ["one", "two", "three", "four", "five"];
    let job = job(dir.path(), &lines);
    let flag = CancellationFlag::new();
    let backend = Arc::new(CancellingBackend::new(flag.clone(), 2));

    let outcome = TranslationRunner::new(
        backend,
        RequestLimiter::new(4),
        flag,
        settings(ResumePolicy::ValidateLineCount, EmptyLinePolicy::Skip, 1),
    )
    .run(&job)
    .await
    .unwrap();

    assert_eq!(outcome.status, JobStatus::Cancelled);
    assert!(!outcome.status.is_complete());
    assert_eq!(common::read_lines(&job.output_path), vec!["one", "two"]);

    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));
    let outcome = runner(backend.clone(), default_settings()).run(&job).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Resumed);
    assert_eq!(backend.calls(), 3);
    assert_eq!(common::read_lines(&job.output_path), lines.to_vec());
}

#[tokio::test]
async fn test_run_withCancelledFlag_shouldMakeNoCalls() {
    let dir = common::create_temp_dir().unwrap();
    let job = job(dir.path(), &["one", "two"]);
    let flag = CancellationFlag::new();
    flag.cancel();
    let backend = Arc::new(MockBackend::new("mock", MockProvider::echo()));

    let outcome = TranslationRunner::new(backend.clone(), RequestLimiter::new(1), flag, default_settings())
        .run(&job)
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Cancelled);
    assert_eq!(backend.calls(), 0);
}
