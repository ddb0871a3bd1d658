/*!
 * End-to-end runs over temp corpora with in-process backends
 */

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use truthscore::app_config::{Config, EmptyLinePolicy};
use truthscore::orchestrator::Orchestrator;
use truthscore::scoring::report::AVERAGE_LABEL;
use truthscore::scoring::HashedNgramEmbedder;
use truthscore::translation::{
    CancellationFlag, JobStatus, LanguagePairKey, MockBackend, TranslationBackend,
};

use crate::common;

fn orchestrator(config: Config, backends: Vec<Arc<dyn TranslationBackend>>) -> Orchestrator {
    let entries = backends.into_iter().map(|b| Orchestrator::entry(&config, b)).collect();
    let similarity = Arc::new(HashedNgramEmbedder::new(config.scoring.similarity.dimensions));
    Orchestrator::with_backends(config, entries, similarity)
}

fn seed_corpora(root: &std::path::Path) {
    let corpus_root = root.join("Original");
    common::write_corpus(&corpus_root, "eng", &["Hello World", "", "Good Morning", "Thank You"]);
    common::write_corpus(&corpus_root, "ur", &["Salaam Dunya", "", "Subah Bakhair", "Shukriya"]);
}

#[tokio::test]
async fn test_run_withTwoBackends_shouldWriteOutputsAndReports() {
    common::init_logger();
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let config = common::test_config(dir.path(), &[("eng", "ur"), ("ur", "eng")], &["echo", "lower"]);
    let echo = Arc::new(MockBackend::new("echo", truthscore::providers::mock::MockProvider::echo()));
    let lower = Arc::new(common::lowercase_backend("lower"));

    let summary = orchestrator(config, vec![echo.clone(), lower.clone()]).run().await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(summary.jobs.len(), 4);
    assert_eq!(echo.calls(), 6);
    assert_eq!(lower.calls(), 6);

    let translated = dir.path().join("Translated");
    assert_eq!(
        common::read_lines(&translated.join("lower").join("eng_to_ur.txt")),
        vec!["hello world", "good morning", "thank you"]
    );

    let echo_report = summary.report("echo").unwrap();
    assert_eq!(echo_report.csv, translated.join("echo").join("echo_truthfulness.csv"));
    let csv = common::read_lines(&echo_report.csv);
    assert_eq!(csv[0], "line,eng_to_ur,ur_to_eng");
    assert_eq!(csv[1], "1,1,1");
    assert_eq!(csv.len(), 5);
    assert_eq!(csv[4], format!("{},1,1", AVERAGE_LABEL));
    assert!(summary.report("lower").unwrap().metadata.exists());
}

#[tokio::test]
async fn test_run_again_shouldSkipEveryJob() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let config = common::test_config(dir.path(), &[("eng", "ur")], &["echo"]);
    let echo = Arc::new(MockBackend::new("echo", truthscore::providers::mock::MockProvider::echo()));

    orchestrator(config.clone(), vec![echo.clone()]).run().await;
    let output = dir.path().join("Translated").join("echo").join("eng_to_ur.txt");
    let before = fs::read(&output).unwrap();
    let calls = echo.calls();

    let summary = orchestrator(config, vec![echo.clone()]).run().await;

    let pair = LanguagePairKey::new("eng", "ur");
    assert_eq!(summary.job("echo", &pair).unwrap().status, JobStatus::Skipped);
    assert_eq!(echo.calls(), calls);
    assert_eq!(fs::read(&output).unwrap(), before);
    assert!(summary.report("echo").is_some());
}

#[tokio::test]
async fn test_run_withForce_shouldTranslateAgain() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let config = common::test_config(dir.path(), &[("eng", "ur")], &["echo"]);
    let echo = Arc::new(MockBackend::new("echo", truthscore::providers::mock::MockProvider::echo()));

    orchestrator(config.clone(), vec![echo.clone()]).run().await;
    let summary = orchestrator(config, vec![echo.clone()]).with_force(true).run().await;

    let pair = LanguagePairKey::new("eng", "ur");
    assert_eq!(summary.job("echo", &pair).unwrap().status, JobStatus::Completed);
    assert_eq!(echo.calls(), 6);
}

#[tokio::test]
async fn test_run_withMissingCorpus_shouldFailOnlyAffectedJobs() {
    let dir = common::create_temp_dir().unwrap();
    common::write_corpus(&dir.path().join("Original"), "eng", &["Hello", "World"]);
    let config = common::test_config(dir.path(), &[("eng", "pa"), ("pa", "eng")], &["echo"]);
    let echo = Arc::new(MockBackend::new("echo", truthscore::providers::mock::MockProvider::echo()));

    let summary = orchestrator(config, vec![echo.clone()]).run().await;

    assert!(!summary.is_success());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].pair, Some(LanguagePairKey::new("pa", "eng")));
    assert_eq!(summary.jobs.len(), 1);

    let csv = common::read_lines(&summary.report("echo").unwrap().csv);
    assert_eq!(csv[0], "line,eng_to_pa");
}

#[tokio::test]
async fn test_run_withFailingBackend_shouldStillScoreSentinels() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let config = common::test_config(dir.path(), &[("eng", "ur")], &["broken"]);
    let broken = Arc::new(MockBackend::new("broken", truthscore::providers::mock::MockProvider::rejecting()));

    let summary = orchestrator(config, vec![broken]).run().await;

    assert!(summary.is_success());
    let pair = LanguagePairKey::new("eng", "ur");
    assert_eq!(summary.job("broken", &pair).unwrap().failed_lines, 3);
    let csv = common::read_lines(&summary.report("broken").unwrap().csv);
    assert_eq!(csv.len(), 5);
    assert!(csv[4].starts_with(AVERAGE_LABEL));
}

#[tokio::test]
async fn test_scoreExisting_shouldSkipMalformedNames() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let backend_dir = dir.path().join("Translated").join("marian");
    fs::create_dir_all(&backend_dir).unwrap();
    fs::write(backend_dir.join("eng_to_ur.txt"), "Hello World\nGood Morning\nThank You\n").unwrap();
    fs::write(backend_dir.join("eng-ur.txt"), "ignored\n").unwrap();
    fs::write(backend_dir.join("notes.md"), "ignored\n").unwrap();
    let config = common::test_config(dir.path(), &[("eng", "ur")], &["echo"]);

    let summary = orchestrator(config, Vec::new()).score_existing().await.unwrap();

    assert!(summary.is_success(), "{:?}", summary.failures);
    let report = summary.report("marian").unwrap();
    assert_eq!(report.csv, backend_dir.join("marian_truthfulness.csv"));
    let csv = common::read_lines(&report.csv);
    assert_eq!(csv[0], "line,eng_to_ur");
    assert_eq!(csv[4], format!("{},1", AVERAGE_LABEL));
}

#[tokio::test]
async fn test_scoreExisting_withUnknownSourceCorpus_shouldReportFailure() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let backend_dir = dir.path().join("Translated").join("gpt");
    fs::create_dir_all(&backend_dir).unwrap();
    fs::write(backend_dir.join("eng_to_ur.txt"), "Hello World\n").unwrap();
    fs::write(backend_dir.join("fr_to_eng.txt"), "Bonjour\n").unwrap();
    let config = common::test_config(dir.path(), &[("eng", "ur")], &["echo"]);

    let summary = orchestrator(config, Vec::new()).score_existing().await.unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].pair, Some(LanguagePairKey::new("fr", "eng")));
    assert!(summary.report("gpt").is_some());
}

#[tokio::test]
async fn test_new_fromConfig_shouldBuildMockBackends() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let config = common::test_config(dir.path(), &[("ur", "eng")], &["dry-run"]);

    let summary = Orchestrator::new(config).unwrap().run().await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    let output = dir.path().join("Translated").join("dry-run").join("ur_to_eng.txt");
    assert_eq!(
        common::read_lines(&output),
        vec!["Salaam Dunya", "Subah Bakhair", "Shukriya"]
    );
}

#[tokio::test]
async fn test_run_withCancelledFlag_shouldSkipScoringThenResume() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let config = common::test_config(dir.path(), &[("eng", "ur")], &["echo"]);
    let echo = Arc::new(MockBackend::new("echo", truthscore::providers::mock::MockProvider::echo()));
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let summary = orchestrator(config.clone(), vec![echo.clone()])
        .with_cancellation(cancel)
        .run()
        .await;

    assert!(summary.cancelled);
    assert!(!summary.is_success());
    assert!(summary.reports.is_empty());
    assert_eq!(echo.calls(), 0);

    let summary = orchestrator(config, vec![echo.clone()]).run().await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(echo.calls(), 3);
    assert!(summary.report("echo").is_some());
}

#[tokio::test]
async fn test_run_withTwoJobs_shouldRespectGlobalRequestCap() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let mut config = common::test_config(dir.path(), &[("eng", "ur"), ("ur", "eng")], &["busy"]);
    config.backends[0].concurrent_requests = 4;
    config.runner.max_concurrent_jobs = 2;
    config.runner.max_global_requests = 2;
    let busy = Arc::new(common::InFlightBackend::new("busy", Duration::from_millis(20)));

    let summary = orchestrator(config, vec![busy.clone()]).run().await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(busy.calls(), 6);
    assert_eq!(busy.peak(), 2);
}

#[tokio::test]
async fn test_run_withPreservedEmptyLines_shouldKeepCorpusLength() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let mut config = common::test_config(dir.path(), &[("eng", "ur")], &["echo"]);
    config.runner.empty_lines = EmptyLinePolicy::Preserve;
    let echo = Arc::new(MockBackend::new("echo", truthscore::providers::mock::MockProvider::echo()));

    let summary = orchestrator(config, vec![echo.clone()]).run().await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(echo.calls(), 3);
    let translated = dir.path().join("Translated").join("echo");
    assert_eq!(
        common::read_lines(&translated.join("eng_to_ur.txt")),
        vec!["Hello World", "", "Good Morning", "Thank You"]
    );

    let csv = common::read_lines(&summary.report("echo").unwrap().csv);
    assert_eq!(csv[0], "line,eng_to_ur");
    assert_eq!(csv[2], "2,1");
    assert_eq!(csv.len(), 6);
    assert_eq!(csv[5], format!("{},1", AVERAGE_LABEL));
}

#[tokio::test]
async fn test_run_withPairModels_shouldSkipUnmappedDirections() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let mut config = common::test_config(dir.path(), &[("eng", "ur"), ("ur", "eng")], &["marian"]);
    config.backends[0]
        .pair_models
        .insert("eng_to_ur".to_string(), "Helsinki-NLP/opus-mt-en-ur".to_string());

    let summary = Orchestrator::new(config).unwrap().run().await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(summary.jobs.len(), 1);
    assert!(summary.job("marian", &LanguagePairKey::new("eng", "ur")).is_some());
    let translated = dir.path().join("Translated").join("marian");
    assert!(!translated.join("ur_to_eng.txt").exists());
    let csv = common::read_lines(&summary.report("marian").unwrap().csv);
    assert_eq!(csv[0], "line,eng_to_ur");
}

#[tokio::test]
async fn test_run_withClosedRequestLimiter_shouldStopBeforeAnyCall() {
    let dir = common::create_temp_dir().unwrap();
    seed_corpora(dir.path());
    let config = common::test_config(dir.path(), &[("eng", "ur")], &["echo"]);
    let echo = Arc::new(MockBackend::new("echo", truthscore::providers::mock::MockProvider::echo()));
    let orchestrator = orchestrator(config, vec![echo.clone()]);
    orchestrator.request_limiter().close();

    let summary = orchestrator.run().await;

    assert!(summary.cancelled);
    assert!(summary.reports.is_empty());
    assert_eq!(echo.calls(), 0);
    let pair = LanguagePairKey::new("eng", "ur");
    assert_eq!(summary.job("echo", &pair).unwrap().status, JobStatus::Cancelled);
}
