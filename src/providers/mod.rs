/*!
 * Provider implementations for translation backends and subtitle sources.
 *
 * This module contains client implementations for the supported services:
 * - Google Translate: keyless web endpoint
 * - Google API: Google Cloud Translation v2
 * - OpenAI compatible: ChatGPT, DeepSeek and Gemini chat completions
 * - OpenSubtitles: source subtitle search and download
 */

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::file_utils::MediaKind;

/// Common trait for all translation backends
///
/// A backend translates an ordered batch of texts and returns one translation
/// per input, in the same order. Implementations do not retry; the batch
/// orchestrator owns the retry policy.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Provider display name, as used in cache paths and logs
    fn name(&self) -> &str;

    /// Translate a batch of texts into the target language
    ///
    /// # Arguments
    /// * `texts` - The texts to translate, in document order
    /// * `target_language` - ISO code of the target language
    ///
    /// # Returns
    /// * `Result<Vec<String>, ProviderError>` - The translations; the orchestrator verifies the count
    async fn translate_batch(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError>;
}

/// A subtitle file offered by a source provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubtitleCandidate {
    /// Download URL
    pub url: String,
    /// Language code as reported by the source
    pub lang: String,
}

/// Where untranslated subtitles come from
#[async_trait]
pub trait SubtitleSource: Send + Sync + Debug {
    /// Find the best subtitle for a title, preferring the target language
    async fn search(
        &self,
        kind: MediaKind,
        title_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
        target_language: &str,
    ) -> Result<Option<SubtitleCandidate>, ProviderError>;

    /// Download the raw bytes of a candidate
    async fn download(&self, candidate: &SubtitleCandidate) -> Result<Vec<u8>, ProviderError>;
}

/// Resolved connection settings for one backend instance.
///
/// Built from the configuration file, then optionally overridden with the
/// credentials a request carries.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub provider: TranslationProvider,
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl BackendSettings {
    /// Settings for a provider as configured
    pub fn from_config(config: &TranslationConfig, provider: TranslationProvider) -> Self {
        Self {
            provider,
            api_key: config.api_key_for(provider),
            model: config.model_for(provider),
            endpoint: config.endpoint_for(provider),
            timeout: Duration::from_secs(config.timeout_secs_for(provider)),
            temperature: config.common.temperature,
        }
    }

    /// Replace configured values with non-empty request overrides
    pub fn with_overrides(
        mut self,
        api_key: Option<&str>,
        model: Option<&str>,
        endpoint: Option<&str>,
    ) -> Self {
        let pick = |value: Option<&str>| value.map(str::trim).filter(|v| !v.is_empty()).map(String::from);
        if let Some(key) = pick(api_key) {
            self.api_key = key;
        }
        if let Some(model) = pick(model) {
            self.model = model;
        }
        if let Some(endpoint) = pick(endpoint) {
            self.endpoint = endpoint;
        }
        self
    }
}

/// Create the backend for the configured provider
pub fn create_backend(settings: &BackendSettings) -> Result<Arc<dyn TranslationBackend>, ProviderError> {
    if settings.provider.requires_api_key() && settings.api_key.is_empty() {
        return Err(ProviderError::AuthenticationError(format!(
            "{} requires an API key",
            settings.provider.display_name()
        )));
    }

    let backend: Arc<dyn TranslationBackend> = match settings.provider {
        TranslationProvider::Google => Arc::new(google_free::GoogleTranslateFree::new(
            &settings.endpoint,
            settings.timeout,
        )),
        TranslationProvider::GoogleApi => Arc::new(google_cloud::GoogleCloudTranslate::new(
            &settings.endpoint,
            &settings.api_key,
            settings.timeout,
        )),
        TranslationProvider::ChatGpt | TranslationProvider::DeepSeek | TranslationProvider::Gemini => {
            Arc::new(openai::OpenAiCompatible::new(
                settings.provider.display_name(),
                &settings.endpoint,
                &settings.api_key,
                &settings.model,
                settings.temperature,
                settings.timeout,
            ))
        }
    };

    Ok(backend)
}

// Shared HTTP client setup
pub(crate) fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
}

// Turns a non-success response into a classified provider error
pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("Provider API error ({}): {}", status, body);
    ProviderError::from_response(status, body)
}

pub mod google_free;
pub mod google_cloud;
pub mod openai;
pub mod opensubtitles;
pub mod mock;
