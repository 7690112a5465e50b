use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{build_http_client, error_from_response, TranslationBackend};

/// Google Cloud Translation v2 client
#[derive(Debug)]
pub struct GoogleCloudTranslate {
    /// HTTP client for API requests
    client: Client,
    /// API base URL
    endpoint: String,
    /// API key for authentication
    api_key: String,
}

/// Translate request body
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

impl GoogleCloudTranslate {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_http_client(timeout),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    async fn translate_one(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        let url = format!("{}/language/translate/v2", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&TranslateRequest {
                q: text,
                target: target_language,
                format: "text",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: TranslateResponse = response.json().await?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| ProviderError::ParseError("Empty translations array".to_string()))
    }
}

#[async_trait]
impl TranslationBackend for GoogleCloudTranslate {
    fn name(&self) -> &str {
        "Google API"
    }

    // One request per text, all in flight at once
    async fn translate_batch(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let results = try_join_all(texts.iter().map(|t| self.translate_one(t, target_language))).await?;
        debug!("Google API translated {} subtitle texts", results.len());
        Ok(results)
    }
}
