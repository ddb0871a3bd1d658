use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::language_utils;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the original corpora
    #[serde(default = "default_corpus_root")]
    pub corpus_root: PathBuf,

    /// Extension of corpus files (`eng.devtest` -> `devtest`)
    #[serde(default = "default_corpus_extension")]
    pub corpus_extension: String,

    /// Directory holding per-backend translation output and reports
    #[serde(default = "default_translated_root")]
    pub translated_root: PathBuf,

    /// Per-language naming overrides
    #[serde(default = "default_languages")]
    pub languages: Vec<LanguageConfig>,

    /// Translation directions to process
    #[serde(default = "default_language_pairs")]
    pub language_pairs: Vec<LanguagePairConfig>,

    /// Translation backends to evaluate
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,

    /// Translation runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Scoring settings
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Naming overrides for one corpus language
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LanguageConfig {
    /// Corpus token, also used in output file names
    pub code: String,

    /// Name used in prompts, e.g. "Punjabi (Gurmukhi script)"
    #[serde(default)]
    pub name: Option<String>,

    /// Code sent to code-based APIs when it differs from the corpus token
    #[serde(default)]
    pub api_code: Option<String>,
}

/// One translation direction
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LanguagePairConfig {
    pub source: String,
    pub target: String,
}

impl LanguagePairConfig {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Translation backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    // @backend: Ollama (local LLM)
    #[default]
    Ollama,
    // @backend: OpenAI chat completions
    OpenAI,
    // @backend: Anthropic messages
    Anthropic,
    // @backend: LM Studio (OpenAI-compatible local server)
    LMStudio,
    // @backend: Google Cloud Translation v2
    Google,
    // @backend: Deterministic offline backend
    Mock,
}

impl BackendType {
    // @returns: Capitalized backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
            Self::Google => "Google Translate",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase backend identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
            Self::Google => "google".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }

    /// Whether the backend selects a model per request; Google picks its own
    pub fn uses_model(&self) -> bool {
        !matches!(self, Self::Google)
    }

    /// Whether the backend refuses to work without an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic | Self::Google)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for BackendType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            "google" => Ok(Self::Google),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid backend type: {}", s)),
        }
    }
}

/// Configuration of one translation backend
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    // @field: Backend type identifier
    #[serde(rename = "type")]
    pub backend_type: BackendType,

    // @field: Output namespace; defaults to the type name
    #[serde(default = "String::new")]
    pub id: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Per-call timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Worker pool size per job
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Temperature for LLM backends
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: Model per direction, keyed `{src}_to_{dst}`; unmapped pairs fall back to `model`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pair_models: BTreeMap<String, String>,
}

impl BackendConfig {
    // @param backend_type: Backend enum
    // @returns: Backend config with defaults
    pub fn new(backend_type: BackendType) -> Self {
        Self {
            backend_type,
            id: String::new(),
            model: String::new(),
            api_key: String::new(),
            endpoint: String::new(),
            timeout_secs: default_timeout_secs(),
            concurrent_requests: default_concurrent_requests(),
            temperature: default_temperature(),
            pair_models: BTreeMap::new(),
        }
    }

    /// Stable identifier used to namespace output directories
    pub fn id(&self) -> String {
        if self.id.is_empty() {
            self.backend_type.to_lowercase_string()
        } else {
            self.id.clone()
        }
    }

    /// Get the model, falling back to the backend default
    pub fn get_model(&self) -> String {
        if !self.model.is_empty() {
            return self.model.clone();
        }

        match self.backend_type {
            BackendType::Ollama => default_ollama_model(),
            BackendType::OpenAI => default_openai_model(),
            BackendType::Anthropic => default_anthropic_model(),
            BackendType::LMStudio => default_lmstudio_model(),
            BackendType::Google | BackendType::Mock => String::new(),
        }
    }

    /// Get the endpoint, falling back to the backend default
    pub fn get_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }

        match self.backend_type {
            BackendType::Ollama => default_ollama_endpoint(),
            BackendType::OpenAI => default_openai_endpoint(),
            BackendType::Anthropic => default_anthropic_endpoint(),
            BackendType::LMStudio => default_lmstudio_endpoint(),
            BackendType::Google => default_google_endpoint(),
            BackendType::Mock => String::new(),
        }
    }

    /// Get the API key; LM Studio accepts any non-empty key
    pub fn get_api_key(&self) -> String {
        if self.api_key.is_empty() && self.backend_type == BackendType::LMStudio {
            return "lm-studio".to_string();
        }
        self.api_key.clone()
    }
}

/// What to do with an output file left by a previous run
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResumePolicy {
    /// Any non-empty output is treated as complete
    TrustExisting,
    /// Compare the line count against the current corpus and resume a prefix
    #[default]
    ValidateLineCount,
    /// Discard existing output and translate again
    Force,
}

/// How empty corpus lines are handled during translation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyLinePolicy {
    /// Not translated and not written
    #[default]
    Skip,
    /// Written as empty output lines without a backend call
    Preserve,
}

/// Translation runner settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Retry count for transient failures
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Backend calls in flight across all jobs
    #[serde(default = "default_max_global_requests")]
    pub max_global_requests: usize,

    /// Jobs running at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Resume behaviour for existing output files
    #[serde(default)]
    pub resume_policy: ResumePolicy,

    /// Empty line handling
    #[serde(default)]
    pub empty_lines: EmptyLinePolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_global_requests: default_max_global_requests(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            resume_policy: ResumePolicy::default(),
            empty_lines: EmptyLinePolicy::default(),
        }
    }
}

/// Similarity backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityType {
    /// Ollama embeddings endpoint
    Ollama,
    /// Offline hashed character n-grams
    #[default]
    HashedNgram,
}

/// Similarity backend settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimilarityConfig {
    #[serde(rename = "type", default)]
    pub similarity_type: SimilarityType,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Service URL
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Vector size for the hashed embedder
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Per-call timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            similarity_type: SimilarityType::default(),
            model: default_embedding_model(),
            endpoint: default_ollama_endpoint(),
            dimensions: default_dimensions(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Scoring settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Embedding calls in flight per scored pair
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Decimal places of the average row
    #[serde(default = "default_precision")]
    pub precision: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityConfig::default(),
            concurrent_requests: default_concurrent_requests(),
            precision: default_precision(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("LLM_dataset/Original")
}

fn default_corpus_extension() -> String {
    "devtest".to_string()
}

fn default_translated_root() -> PathBuf {
    PathBuf::from("LLM_dataset/Translated")
}

fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "eng".to_string(),
            name: Some("English".to_string()),
            api_code: Some("en".to_string()),
        },
        LanguageConfig {
            code: "ur".to_string(),
            name: Some("Urdu".to_string()),
            api_code: None,
        },
        LanguageConfig {
            code: "pa".to_string(),
            name: Some("Punjabi (Gurmukhi script)".to_string()),
            api_code: None,
        },
    ]
}

fn default_language_pairs() -> Vec<LanguagePairConfig> {
    vec![
        LanguagePairConfig::new("eng", "ur"),
        LanguagePairConfig::new("eng", "pa"),
        LanguagePairConfig::new("ur", "eng"),
        LanguagePairConfig::new("ur", "pa"),
        LanguagePairConfig::new("pa", "eng"),
        LanguagePairConfig::new("pa", "ur"),
    ]
}

fn default_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::new(BackendType::Ollama)]
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_max_global_requests() -> usize {
    8
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_temperature() -> f32 {
    0.3
}

fn default_precision() -> u32 {
    4
}

fn default_dimensions() -> usize {
    512
}

fn default_embedding_model() -> String {
    "paraphrase-multilingual".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_google_endpoint() -> String {
    "https://translation.googleapis.com".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_lmstudio_model() -> String {
    "local-model".to_string()
}

impl Config {
    /// Load the configuration file, creating it with defaults when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.language_pairs.is_empty() {
            return Err(anyhow!("At least one language pair is required"));
        }

        for pair in &self.language_pairs {
            if pair.source.trim().is_empty() || pair.target.trim().is_empty() {
                return Err(anyhow!("Language pair codes cannot be empty"));
            }
            if pair.source == pair.target
                || language_utils::language_codes_match(&pair.source, &pair.target)
            {
                return Err(anyhow!(
                    "Language pair {}_to_{} translates into itself",
                    pair.source,
                    pair.target
                ));
            }
        }

        if self.backends.is_empty() {
            return Err(anyhow!("At least one backend is required"));
        }

        let mut ids = HashSet::new();
        for backend in &self.backends {
            let id = backend.id();
            if !ids.insert(id.clone()) {
                return Err(anyhow!("Duplicate backend id: {}", id));
            }
            if id.contains('/') || id.contains('\\') {
                return Err(anyhow!("Backend id cannot contain path separators: {}", id));
            }
            if id == "." || id == ".." {
                return Err(anyhow!("Backend id cannot be a relative directory: {}", id));
            }
            if !backend.pair_models.is_empty() && !backend.backend_type.uses_model() {
                return Err(anyhow!(
                    "Backend '{}' does not take a model; remove its pair_models",
                    id
                ));
            }
            for (key, model) in &backend.pair_models {
                let valid = key
                    .split_once("_to_")
                    .is_some_and(|(src, dst)| !src.is_empty() && !dst.is_empty());
                if !valid || model.trim().is_empty() {
                    return Err(anyhow!(
                        "Backend '{}' has an invalid pair model entry '{}': '{}'",
                        id,
                        key,
                        model
                    ));
                }
            }
            if backend.backend_type.requires_api_key() && backend.api_key.is_empty() {
                return Err(anyhow!(
                    "API key is required for {} backend '{}'",
                    backend.backend_type.display_name(),
                    id
                ));
            }
            if backend.concurrent_requests == 0 {
                return Err(anyhow!("Backend '{}' needs at least one concurrent request", id));
            }
        }

        if self.runner.max_global_requests == 0 || self.runner.max_concurrent_jobs == 0 {
            return Err(anyhow!("Runner concurrency limits must be positive"));
        }

        if self.scoring.concurrent_requests == 0 {
            return Err(anyhow!("Scoring concurrency must be positive"));
        }

        if self.scoring.precision > 12 {
            return Err(anyhow!("Report precision is limited to 12 decimals"));
        }

        if self.scoring.similarity.similarity_type == SimilarityType::HashedNgram
            && self.scoring.similarity.dimensions == 0
        {
            return Err(anyhow!("Hashed embedder needs a positive dimension count"));
        }

        Ok(())
    }

    /// Source languages referenced by the configured pairs, in first-seen order
    pub fn source_languages(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.language_pairs
            .iter()
            .filter(|p| seen.insert(p.source.clone()))
            .map(|p| p.source.clone())
            .collect()
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            corpus_root: default_corpus_root(),
            corpus_extension: default_corpus_extension(),
            translated_root: default_translated_root(),
            languages: default_languages(),
            language_pairs: default_language_pairs(),
            backends: default_backends(),
            runner: RunnerConfig::default(),
            scoring: ScoringConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
