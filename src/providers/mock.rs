/*!
 * Mock provider for tests and offline dry runs.
 *
 * - `MockProvider::echo()` - returns the input unchanged
 * - `MockProvider::working()` - tags the input with the target language
 * - `MockProvider::intermittent(n)` - every nth request fails transiently
 * - `MockProvider::failing()` / `rejecting()` - always fails, transiently / permanently
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Mock request for testing
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// The text to translate
    pub text: String,
    /// Source language
    pub source_language: String,
    /// Target language
    pub target_language: String,
}

/// Mock response for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// The translated text
    pub text: String,
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Returns the input text unchanged
    Echo,
    /// Returns `[target] text`, or the custom generator output
    Working,
    /// Fails with a 503 on every `fail_every`th request
    Intermittent { fail_every: usize },
    /// Fails with a 503 for the first `count` requests, then works
    FailFirst { count: usize },
    /// Always fails with a 503
    Failing,
    /// Always fails with a 400
    Rejecting,
    /// Returns an empty response
    Empty,
    /// Sleeps before echoing the input
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&MockRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            custom_response: None,
        }
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    pub fn fail_first(count: usize) -> Self {
        Self::new(MockBehavior::FailFirst { count })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn rejecting() -> Self {
        Self::new(MockBehavior::Rejecting)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator used by `Working`
    pub fn with_custom_response(mut self, generator: fn(&MockRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn unavailable(count: usize) -> ProviderError {
        ProviderError::ApiError {
            status_code: 503,
            message: format!("Simulated outage (request #{})", count + 1),
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = MockRequest;
    type Response = MockResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        let text = match self.behavior {
            MockBehavior::Echo => request.text,
            MockBehavior::Working => match self.custom_response {
                Some(generator) => generator(&request),
                None => format!("[{}] {}", request.target_language, request.text),
            },
            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    return Err(Self::unavailable(count));
                }
                request.text
            }
            MockBehavior::FailFirst { count: failures } => {
                if count < failures {
                    return Err(Self::unavailable(count));
                }
                request.text
            }
            MockBehavior::Failing => return Err(Self::unavailable(count)),
            MockBehavior::Rejecting => {
                return Err(ProviderError::ApiError {
                    status_code: 400,
                    message: format!(
                        "Unsupported language pair {} -> {}",
                        request.source_language, request.target_language
                    ),
                });
            }
            MockBehavior::Empty => String::new(),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                request.text
            }
        };

        Ok(MockResponse { text })
    }

    fn extract_text(response: &Self::Response) -> String {
        response.text.clone()
    }
}
