/*!
 * Error types for the truthscore application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The provider returned no usable text
    #[error("Provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) | Self::EmptyResponse => false,
        }
    }

    /// Map an HTTP error status to the matching provider error
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::RequestFailed(format!("timeout: {}", error))
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors a translation backend reports for a single line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// Timeouts, rate limits, server errors; worth retrying
    #[error("{0}")]
    Transient(String),

    /// Unsupported pair, malformed input, rejected credentials
    #[error("{0}")]
    Permanent(String),
}

impl TranslationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient(message) | Self::Permanent(message) => message,
        }
    }
}

impl From<ProviderError> for TranslationError {
    fn from(error: ProviderError) -> Self {
        if error.is_transient() {
            Self::Transient(error.to_string())
        } else {
            Self::Permanent(error.to_string())
        }
    }
}

/// Errors raised while loading or looking up corpora
#[derive(Error, Debug)]
pub enum CorpusError {
    /// No source file exists for the language code
    #[error("Corpus not found for language '{language}' at {path:?}")]
    NotFound { language: String, path: PathBuf },

    /// The corpus was requested before being loaded
    #[error("Corpus not loaded for language '{0}'")]
    NotLoaded(String),

    /// The corpus file exists but could not be read
    #[error("Failed to read corpus {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a similarity backend
#[derive(Error, Debug)]
pub enum SimilarityError {
    /// Error from the provider API
    #[error("Embedding provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Two embeddings cannot be compared
    #[error("Embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Job-level failures; these escalate to the orchestrator
#[derive(Error, Debug)]
pub enum JobError {
    /// The source corpus is missing
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Output or report could not be written
    #[error("Persistence failure at {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Existing output holds more lines than the current corpus can produce
    #[error("Stale output {path:?}: found {found} lines, expected at most {expected} (use --force to redo)")]
    StaleOutput {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    /// Scoring could not embed a line
    #[error("Scoring failed: {0}")]
    Similarity(#[from] SimilarityError),

    /// The report could not be serialized
    #[error("Report error: {0}")]
    Report(String),
}

impl JobError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
