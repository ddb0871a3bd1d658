/*!
 * Provider implementations for the remote and local services used by the backends.
 *
 * - Ollama: local LLM server (generation and embeddings)
 * - OpenAI: OpenAI-compatible chat completions (also LM Studio)
 * - Anthropic: Anthropic messages API
 * - Google: Google Cloud Translation v2
 * - Mock: deterministic in-process provider for tests and dry runs
 */

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::ProviderError;

/// Common trait for all providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing the backends to treat them uniformly.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// Build the HTTP client shared by the remote providers
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-success status into a classified error, or decode the JSON body
pub(crate) async fn decode_json<T: DeserializeOwned>(
    provider: &str,
    response: Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        log::debug!("{} API error ({}): {}", provider, status, error_text);
        return Err(ProviderError::from_status(status.as_u16(), error_text));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::ParseError(format!("{} response: {}", provider, e)))
}

pub mod anthropic;
pub mod google;
pub mod mock;
pub mod ollama;
pub mod openai;
