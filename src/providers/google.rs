use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{decode_json, http_client, Provider};
use crate::errors::ProviderError;

/// Google Cloud Translation (v2 REST) client
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: Client,
    api_key: String,
    endpoint: String,
}

/// Translation request; codes are ISO 639-1 where one exists
#[derive(Debug, Serialize)]
pub struct GoogleTranslateRequest {
    pub q: String,
    pub source: String,
    pub target: String,
    pub format: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTranslateResponse {
    pub data: GoogleTranslations,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTranslations {
    pub translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTranslation {
    pub translated_text: String,
}

impl GoogleTranslateRequest {
    pub fn new(text: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            q: text.into(),
            source: source.into(),
            target: target.into(),
            format: "text".to_string(),
        }
    }
}

impl GoogleTranslate {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Provider for GoogleTranslate {
    type Request = GoogleTranslateRequest;
    type Response = GoogleTranslateResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let url = format!("{}/language/translate/v2", self.endpoint);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        decode_json("Google Translate", response).await
    }

    fn extract_text(response: &Self::Response) -> String {
        response
            .data
            .translations
            .first()
            .map(|t| t.translated_text.trim().to_string())
            .unwrap_or_default()
    }
}
