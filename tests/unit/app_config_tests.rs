/*!
 * Tests for application configuration functionality
 */

use std::fs;

use truthscore::app_config::{
    BackendConfig, BackendType, Config, EmptyLinePolicy, LanguagePairConfig, LogLevel, ResumePolicy,
    SimilarityType,
};

use crate::common;

/// Test default configuration values
#[test]
fn test_defaultConfig_shouldBenchmarkThreeLanguages() {
    let config = Config::default();

    assert_eq!(config.language_pairs.len(), 6);
    assert!(config.language_pairs.contains(&LanguagePairConfig::new("eng", "pa")));
    assert_eq!(config.source_languages(), vec!["eng", "ur", "pa"]);
    assert_eq!(config.corpus_extension, "devtest");
    assert_eq!(config.runner.resume_policy, ResumePolicy::ValidateLineCount);
    assert_eq!(config.runner.empty_lines, EmptyLinePolicy::Skip);
    assert_eq!(config.scoring.precision, 4);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.validate().is_ok());
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.language_pairs, config.language_pairs);
}

#[test]
fn test_loadOrCreate_withPolicies_shouldParseKebabCase() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    fs::write(
        &path,
        r#"{
            "language_pairs": [{"source": "eng", "target": "ur"}],
            "backends": [
                {"type": "google", "id": "google", "api_key": "key"},
                {"type": "lmstudio"}
            ],
            "runner": {"resume_policy": "trust-existing", "empty_lines": "preserve"},
            "scoring": {"similarity": {"type": "ollama", "model": "bge-m3"}}
        }"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.backends[0].backend_type, BackendType::Google);
    assert_eq!(config.backends[1].id(), "lmstudio");
    assert_eq!(config.backends[1].get_api_key(), "lm-studio");
    assert_eq!(config.runner.resume_policy, ResumePolicy::TrustExisting);
    assert_eq!(config.runner.empty_lines, EmptyLinePolicy::Preserve);
    assert_eq!(config.scoring.similarity.similarity_type, SimilarityType::Ollama);
    assert_eq!(config.scoring.similarity.model, "bge-m3");
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withBackendIdPathSeparator_shouldFail() {
    let mut config = Config::default();
    config.backends[0].id = "../escape".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(Config::load_or_create(&path).is_err());
}

#[test]
fn test_validate_withRelativeDirectoryId_shouldFail() {
    for id in [".", ".."] {
        let mut config = Config::default();
        config.backends[0].id = id.to_string();
        assert!(config.validate().is_err(), "id {:?} accepted", id);
    }
}

#[test]
fn test_loadOrCreate_withPairModels_shouldParseDirectionMap() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    fs::write(
        &path,
        r#"{
            "language_pairs": [{"source": "eng", "target": "ur"}, {"source": "pa", "target": "ur"}],
            "backends": [{
                "type": "ollama",
                "id": "marian",
                "pair_models": {"eng_to_ur": "opus-mt-en-ur", "pa_to_ur": "opus-mt-mul-ur"}
            }]
        }"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.backends[0].pair_models.len(), 2);
    assert_eq!(config.backends[0].pair_models["pa_to_ur"], "opus-mt-mul-ur");
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withMalformedPairModelKey_shouldFail() {
    let mut config = Config::default();
    config.backends[0]
        .pair_models
        .insert("eng-ur".to_string(), "opus-mt-en-ur".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withPairModelsOnGoogle_shouldFail() {
    let mut config = Config::default();
    let mut google = BackendConfig::new(BackendType::Google);
    google.api_key = "key".to_string();
    google
        .pair_models
        .insert("eng_to_ur".to_string(), "nmt".to_string());
    config.backends = vec![google];
    assert!(config.validate().is_err());
}
