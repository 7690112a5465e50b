use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{build_http_client, error_from_response, TranslationBackend};

/// Separator used to pack a batch into a single query
const SEPARATOR: &str = " ||| ";

/// Client for the keyless Google Translate web endpoint
#[derive(Debug)]
pub struct GoogleTranslateFree {
    /// HTTP client for API requests
    client: Client,
    /// Base URL, e.g. https://translate.googleapis.com
    endpoint: String,
}

impl GoogleTranslateFree {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_http_client(timeout),
            endpoint: endpoint.into(),
        }
    }

    fn request_url(&self, texts: &[String], target_language: &str) -> Result<Url, ProviderError> {
        let joined = texts.join(SEPARATOR);
        Url::parse_with_params(
            &format!("{}/translate_a/single", self.endpoint.trim_end_matches('/')),
            &[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", joined.as_str()),
            ],
        )
        .map_err(|e| ProviderError::RequestFailed(format!("Invalid Google Translate URL: {}", e)))
    }
}

/// Concatenate the translated sentence fragments of a response.
///
/// The body is `[[["translated", "original", ...], ...], ...]`.
pub fn extract_translation(body: &Value) -> Result<String, ProviderError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::ParseError("Missing sentence array in Google response".to_string()))?;

    Ok(sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect())
}

/// Split a packed translation back into one text per input.
///
/// Google sometimes swallows separators between very short lines. When the
/// first piece has exactly the number of words needed to make up the missing
/// entries, it is spread over them.
pub fn split_translation(translated: &str, expected: usize) -> Vec<String> {
    let mut pieces: Vec<String> = translated
        .split("|||")
        .map(|p| p.trim().to_string())
        .collect();

    if pieces.len() < expected && !pieces.is_empty() {
        let missing = expected - pieces.len();
        let words: Vec<String> = pieces[0].split(' ').map(String::from).collect();
        if words.len() == missing + 1 {
            debug!("Repairing {} merged entries in Google response", missing);
            pieces.splice(0..1, words);
        } else {
            warn!("Google Translate count mismatch: expected {}, got {}", expected, pieces.len());
        }
    }

    pieces
}

#[async_trait]
impl TranslationBackend for GoogleTranslateFree {
    fn name(&self) -> &str {
        "Google Translate"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.request_url(texts, target_language)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response.json().await?;
        let translated = extract_translation(&body)?;
        Ok(split_translation(&translated, texts.len()))
    }
}
