use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{build_http_client, error_from_response, TranslationBackend};

/// Client for OpenAI-compatible chat completion APIs (OpenAI, DeepSeek, Gemini)
#[derive(Debug)]
pub struct OpenAiCompatible {
    /// Provider display name
    name: String,
    /// HTTP client for API requests
    client: Client,
    /// API base URL, without the /chat/completions suffix
    endpoint: String,
    /// API key for authentication
    api_key: String,
    /// Model name
    model: String,
    /// Sampling temperature
    temperature: f32,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    /// The model to use
    model: String,
    /// The messages for the conversation
    messages: Vec<ChatMessage>,
    /// Force a JSON object reply
    response_format: ResponseFormat,
    /// Temperature for generation
    temperature: f32,
}

/// Chat message format
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: String,
    /// Content of the message
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// One entry of the JSON payload exchanged with the model
#[derive(Debug, Serialize, Deserialize)]
struct IndexedText {
    index: usize,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexedTexts {
    texts: Vec<IndexedText>,
}

/// Build the translation prompt for a batch
pub fn build_prompt(texts: &[String], target_language: &str) -> String {
    let payload = IndexedTexts {
        texts: texts
            .iter()
            .enumerate()
            .map(|(index, text)| IndexedText { index, text: text.clone() })
            .collect(),
    };
    let json = serde_json::to_string(&payload).unwrap_or_default();

    format!(
        "You are a professional movie subtitle translator.\n\
         Translate each subtitle text in the \"texts\" array of the following JSON object into the specified language \"{target_language}\".\n\n\
         The output must be a JSON object with the same structure as the input. The \"texts\" array should contain the translated texts corresponding to their original indices.\n\n\
         **Strict Requirements:**\n\
         - Strictly preserve line breaks and original formatting for each subtitle.\n\
         - Do not combine or split texts during translation.\n\
         - The number of elements in the output array must exactly match the input array.\n\
         - Ensure the final JSON is valid and retains the complete structure.\n\n\
         Input:\n{json}\n"
    )
}

/// Extract the translations from a model reply, ordered by index.
///
/// Some models wrap the JSON in a markdown code fence even in JSON mode.
pub fn parse_translations(content: &str) -> Result<Vec<String>, ProviderError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);

    let mut parsed: IndexedTexts = serde_json::from_str(unfenced.trim()).map_err(|e| {
        error!("Failed to parse model reply: {}", e);
        ProviderError::ParseError(format!("Model reply is not the expected JSON: {}", e))
    })?;

    parsed.texts.sort_by_key(|t| t.index);
    Ok(parsed.texts.into_iter().map(|t| t.text).collect())
}

impl OpenAiCompatible {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            client: build_http_client(timeout),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        }
    }

    fn completions_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }

    /// Complete a chat request
    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response.json::<ChatCompletionResponse>().await?)
    }
}

#[async_trait]
impl TranslationBackend for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(texts, target_language),
            }],
            response_format: ResponseFormat { format_type: "json_object" },
            temperature: self.temperature,
        };

        let response = self.complete(&request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::ParseError("Response has no choices".to_string()))?;

        debug!("{} replied with {} bytes", self.name, content.len());
        parse_translations(&content)
    }
}
