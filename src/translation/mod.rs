/*!
 * Corpus translation.
 *
 * - `backend`: the `TranslationBackend` capability and its provider-backed variants
 * - `job`: language pair keys, jobs and their outcomes
 * - `runner`: resumable, concurrent translation of one job
 * - `retry`: per-call timeout and exponential backoff
 * - `writer`: ordered, gapless output persistence
 * - `concurrency`: global request limit and cancellation
 */

pub use self::backend::{create_backend, LanguageNames, MockBackend, ModelSelection, TranslationBackend};
pub use self::concurrency::{CancellationFlag, RequestLimiter};
pub use self::job::{JobOutcome, JobStatus, LanguagePairKey, TranslationJob};
pub use self::retry::RetryPolicy;
pub use self::runner::{RunnerSettings, TranslationRunner};

pub mod backend;
pub mod concurrency;
pub mod job;
pub mod retry;
pub mod runner;
pub mod writer;
