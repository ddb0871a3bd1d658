/*!
 * # truthscore - translation truthfulness benchmark
 *
 * Translates line-aligned parallel corpora with several translation backends
 * and scores every translated line against its original by embedding
 * similarity, producing one CSV report per backend.
 *
 * ## Features
 *
 * - Translation backends:
 *   - Ollama (local LLM)
 *   - OpenAI and LM Studio (OpenAI-compatible chat completions)
 *   - Anthropic API
 *   - Google Cloud Translation
 * - Resumable, index-aligned output with bounded concurrency and retries
 * - Embedding similarity from Ollama or an offline hashed n-gram embedder
 * - CSV reports with per-pair averages and a JSON metadata sidecar
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `corpus`: Corpus loading and sharing
 * - `translation`: Backends, jobs and the resumable runner
 * - `scoring`: Similarity backends, score series and reports
 * - `orchestrator`: Runs backends x language pairs end to end
 * - `providers`: HTTP clients for the remote and local services
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod corpus;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod orchestrator;
pub mod providers;
pub mod scoring;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use corpus::{Corpus, CorpusStore};
pub use errors::{CorpusError, JobError, ProviderError, SimilarityError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use orchestrator::{Orchestrator, RunSummary};
pub use scoring::{ScoreSeries, ScoringEngine, SimilarityBackend};
pub use translation::{LanguagePairKey, TranslationBackend, TranslationRunner};
