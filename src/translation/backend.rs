/*!
 * Translation backends.
 *
 * The runner only knows the `TranslationBackend` capability: translate one line
 * from one language to another, possibly failing. Each variant wraps a provider
 * client and classifies its failures as transient or permanent.
 */

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{BackendConfig, BackendType, LanguageConfig};
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::google::{GoogleTranslate, GoogleTranslateRequest};
use crate::providers::mock::{MockProvider, MockRequest};
use crate::providers::ollama::{GenerationRequest, Ollama};
use crate::providers::openai::{OpenAI, OpenAIRequest};
use crate::providers::Provider;

/// Translate one line of text between two corpus languages
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Stable identifier used to namespace output
    fn id(&self) -> &str;

    /// Whether this backend can translate the direction at all
    fn supports(&self, _source: &str, _target: &str) -> bool {
        true
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError>;
}

/// Resolves corpus language codes to prompt names and API codes
#[derive(Debug, Clone, Default)]
pub struct LanguageNames {
    names: HashMap<String, String>,
    api_codes: HashMap<String, String>,
}

impl LanguageNames {
    pub fn from_languages(languages: &[LanguageConfig]) -> Self {
        let mut names = HashMap::new();
        let mut api_codes = HashMap::new();
        for language in languages {
            if let Some(name) = &language.name {
                names.insert(language.code.clone(), name.clone());
            }
            if let Some(api_code) = &language.api_code {
                api_codes.insert(language.code.clone(), api_code.clone());
            }
        }
        Self { names, api_codes }
    }

    /// Configured name, then the ISO 639 name, then the code itself
    pub fn name(&self, code: &str) -> String {
        self.names
            .get(code)
            .cloned()
            .or_else(|| language_utils::get_language_name(code).ok())
            .unwrap_or_else(|| code.to_string())
    }

    /// Configured API code, then ISO 639-1 when one exists, then the code itself
    pub fn api_code(&self, code: &str) -> String {
        self.api_codes
            .get(code)
            .cloned()
            .or_else(|| language_utils::normalize_to_part1_or_part2t(code).ok())
            .unwrap_or_else(|| code.to_string())
    }
}

/// Model per translation direction, as configured on a backend
#[derive(Debug, Clone, Default)]
pub struct ModelSelection {
    default: Option<String>,
    per_pair: HashMap<String, String>,
}

impl ModelSelection {
    pub fn from_config(config: &BackendConfig) -> Self {
        let default = if config.pair_models.is_empty() || !config.model.is_empty() {
            Some(config.get_model())
        } else {
            None
        };
        Self {
            default,
            per_pair: config.pair_models.clone().into_iter().collect(),
        }
    }

    pub fn model_for(&self, source: &str, target: &str) -> Option<&str> {
        self.per_pair
            .get(&format!("{}_to_{}", source, target))
            .or(self.default.as_ref())
            .map(String::as_str)
    }

    /// Without a pair map every direction is served
    pub fn covers(&self, source: &str, target: &str) -> bool {
        self.per_pair.is_empty() || self.model_for(source, target).is_some()
    }

    fn require(&self, source: &str, target: &str) -> Result<&str, TranslationError> {
        self.model_for(source, target).ok_or_else(|| {
            TranslationError::Permanent(format!("No model configured for {}_to_{}", source, target))
        })
    }
}

fn system_prompt(source_name: &str, target_name: &str) -> String {
    format!(
        "You are a professional translator. Translate the following text from {} to {}. \
         Only respond with the translated text, without any explanations or notes.",
        source_name, target_name
    )
}

fn non_empty(text: String) -> Result<String, TranslationError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse.into())
    } else {
        Ok(text)
    }
}

/// Local LLM through Ollama
pub struct OllamaBackend {
    id: String,
    client: Ollama,
    models: ModelSelection,
    temperature: f32,
    languages: LanguageNames,
}

#[async_trait]
impl TranslationBackend for OllamaBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, source: &str, target: &str) -> bool {
        self.models.covers(source, target)
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        let model = self.models.require(source, target)?;
        let request = GenerationRequest::new(model, text)
            .system(system_prompt(&self.languages.name(source), &self.languages.name(target)))
            .temperature(self.temperature);

        let response = self.client.complete(request).await?;
        non_empty(Ollama::extract_text(&response))
    }
}

/// OpenAI-compatible chat completions (OpenAI, LM Studio)
pub struct ChatBackend {
    id: String,
    client: OpenAI,
    models: ModelSelection,
    temperature: f32,
    languages: LanguageNames,
}

#[async_trait]
impl TranslationBackend for ChatBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, source: &str, target: &str) -> bool {
        self.models.covers(source, target)
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        let model = self.models.require(source, target)?;
        let request = OpenAIRequest::new(model)
            .add_message(
                "system",
                system_prompt(&self.languages.name(source), &self.languages.name(target)),
            )
            .add_message("user", format!("Translate this to {}: {}", self.languages.name(target), text))
            .temperature(self.temperature)
            .max_tokens(1024);

        let response = self.client.complete(request).await?;
        non_empty(OpenAI::extract_text(&response))
    }
}

/// Anthropic messages API
pub struct AnthropicBackend {
    id: String,
    client: Anthropic,
    models: ModelSelection,
    temperature: f32,
    languages: LanguageNames,
}

#[async_trait]
impl TranslationBackend for AnthropicBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, source: &str, target: &str) -> bool {
        self.models.covers(source, target)
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        let model = self.models.require(source, target)?;
        let request = AnthropicRequest::new(model, 1024)
            .system(system_prompt(&self.languages.name(source), &self.languages.name(target)))
            .add_message("user", text)
            .temperature(self.temperature);

        let response = self.client.complete(request).await?;
        non_empty(Anthropic::extract_text(&response))
    }
}

/// Google Cloud Translation; works on language codes rather than names
pub struct GoogleBackend {
    id: String,
    client: GoogleTranslate,
    languages: LanguageNames,
}

#[async_trait]
impl TranslationBackend for GoogleBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        let request = GoogleTranslateRequest::new(text, self.languages.api_code(source), self.languages.api_code(target));
        let response = self.client.complete(request).await?;
        non_empty(GoogleTranslate::extract_text(&response))
    }
}

/// In-process backend over `MockProvider`
#[derive(Clone)]
pub struct MockBackend {
    id: String,
    provider: MockProvider,
    models: ModelSelection,
}

impl MockBackend {
    pub fn new(id: impl Into<String>, provider: MockProvider) -> Self {
        Self {
            id: id.into(),
            provider,
            models: ModelSelection::default(),
        }
    }

    /// Only serve the directions `models` has a model for
    pub fn with_models(mut self, models: ModelSelection) -> Self {
        self.models = models;
        self
    }

    /// Requests the provider has received, retries included
    pub fn calls(&self) -> usize {
        self.provider.request_count()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, source: &str, target: &str) -> bool {
        self.models.covers(source, target)
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        if !self.supports(source, target) {
            return Err(TranslationError::Permanent(format!(
                "No model configured for {}_to_{}",
                source, target
            )));
        }
        let request = MockRequest {
            text: text.to_string(),
            source_language: source.to_string(),
            target_language: target.to_string(),
        };
        let response = self.provider.complete(request).await?;
        non_empty(MockProvider::extract_text(&response))
    }
}

/// Build the backend a configuration entry describes
pub fn create_backend(config: &BackendConfig, languages: LanguageNames) -> Result<Arc<dyn TranslationBackend>> {
    let id = config.id();
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let models = ModelSelection::from_config(config);
    let endpoint = config.get_endpoint();

    let backend: Arc<dyn TranslationBackend> = match config.backend_type {
        BackendType::Ollama => {
            url::Url::parse(&endpoint)?;
            Arc::new(OllamaBackend {
                id,
                client: Ollama::new(endpoint, timeout)?,
                models: models.clone(),
                temperature: config.temperature,
                languages,
            })
        }
        BackendType::OpenAI | BackendType::LMStudio => {
            url::Url::parse(&endpoint)?;
            Arc::new(ChatBackend {
                id,
                client: OpenAI::new(config.get_api_key(), endpoint, timeout)?,
                models: models.clone(),
                temperature: config.temperature,
                languages,
            })
        }
        BackendType::Anthropic => {
            url::Url::parse(&endpoint)?;
            Arc::new(AnthropicBackend {
                id,
                client: Anthropic::new(config.get_api_key(), endpoint, timeout)?,
                models: models.clone(),
                temperature: config.temperature,
                languages,
            })
        }
        BackendType::Google => {
            url::Url::parse(&endpoint)?;
            Arc::new(GoogleBackend {
                id,
                client: GoogleTranslate::new(config.get_api_key(), endpoint, timeout)?,
                languages,
            })
        }
        BackendType::Mock => Arc::new(MockBackend::new(id, MockProvider::echo()).with_models(models)),
    };

    Ok(backend)
}
