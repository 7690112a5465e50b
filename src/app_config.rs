use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default target language code (ISO) when a request does not name one
    pub target_language: String,

    /// Root directory of the translated subtitle cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Public base URL the cache directory is served under
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Job registry database file; defaults to the user data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Jobs older than this are considered abandoned by a crashed process
    #[serde(default = "default_stale_job_after_secs")]
    pub stale_job_after_secs: u64,

    /// Translation jobs allowed to download and translate at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Source subtitle provider settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Translation config
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Google Translate web endpoint, no key required
    #[default]
    Google,
    // @provider: Google Cloud Translation v2
    GoogleApi,
    // @provider: Gemini through its OpenAI-compatible endpoint
    Gemini,
    // @provider: OpenAI or any OpenAI-compatible server
    ChatGpt,
    // @provider: DeepSeek
    DeepSeek,
}

impl TranslationProvider {
    /// All providers, in the order they are offered to users
    pub const ALL: [TranslationProvider; 5] = [
        Self::Google,
        Self::GoogleApi,
        Self::Gemini,
        Self::ChatGpt,
        Self::DeepSeek,
    ];

    // @returns: Human-facing provider name; also the provider segment of cache paths
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google Translate",
            Self::GoogleApi => "Google API",
            Self::Gemini => "Gemini API",
            Self::ChatGpt => "ChatGPT API",
            Self::DeepSeek => "DeepSeek API",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Google => "google".to_string(),
            Self::GoogleApi => "googleapi".to_string(),
            Self::Gemini => "gemini".to_string(),
            Self::ChatGpt => "chatgpt".to_string(),
            Self::DeepSeek => "deepseek".to_string(),
        }
    }

    /// Whether requests to this provider must carry an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Google)
    }

    /// Texts per backend call when the config does not override it
    pub fn default_batch_size(&self) -> usize {
        match self {
            // every batch travels in a GET query string
            Self::Google => 25,
            Self::GoogleApi => 50,
            Self::Gemini | Self::ChatGpt | Self::DeepSeek => 40,
        }
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Accepts both identifiers and display names
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.to_lowercase_string() == wanted || p.display_name().to_lowercase() == wanted)
            .ok_or_else(|| anyhow!("Invalid provider type: {}", s))
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(provider_type),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Source subtitle provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    /// Base URL of the OpenSubtitles v3 addon service
    #[serde(default = "default_source_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_source_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Texts per backend call; provider default when absent
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Attempts per batch, including the first
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds
    #[serde(default = "default_retry_backoff_cap_ms")]
    pub retry_backoff_cap_ms: u64,

    /// Temperature parameter for LLM providers (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_cap_ms: default_retry_backoff_cap_ms(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("subtitles")
}

fn default_base_url() -> String {
    "http://127.0.0.1:7000".to_string()
}

fn default_stale_job_after_secs() -> u64 {
    1800
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_source_endpoint() -> String {
    "https://opensubtitles-v3.strem.io".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_retry_backoff_cap_ms() -> u64 {
    10_000
}

fn default_temperature() -> f32 {
    0.3
}

/// Default model for a provider; empty for providers without model selection
pub fn default_model(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Google | TranslationProvider::GoogleApi => String::new(),
        TranslationProvider::Gemini => "gemini-1.5-flash".to_string(),
        TranslationProvider::ChatGpt => "gpt-4o-mini".to_string(),
        TranslationProvider::DeepSeek => "deepseek-chat".to_string(),
    }
}

/// Default API base URL for a provider
pub fn default_endpoint(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Google => "https://translate.googleapis.com".to_string(),
        TranslationProvider::GoogleApi => "https://translation.googleapis.com".to_string(),
        TranslationProvider::Gemini => {
            "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
        }
        TranslationProvider::ChatGpt => "https://api.openai.com/v1".to_string(),
        TranslationProvider::DeepSeek => "https://api.deepseek.com".to_string(),
    }
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if self.translation.provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        if self.translation.common.batch_size == Some(0) {
            return Err(anyhow!("Batch size must be greater than zero"));
        }

        if self.max_concurrent_jobs == 0 {
            return Err(anyhow!("At least one translation job must be allowed to run"));
        }

        if self.translation.common.retry_count == 0 {
            return Err(anyhow!("Retry count must allow at least one attempt"));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| anyhow!("Invalid base URL '{}': {}", self.base_url, e))?;

        Ok(())
    }

    /// Job registry database location
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::database::DatabaseConnection::default_database_path(),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: "en".to_string(),
            cache_dir: default_cache_dir(),
            base_url: default_base_url(),
            database_path: None,
            stale_job_after_secs: default_stale_job_after_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            source: SourceConfig::default(),
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.api_key_for(self.provider)
    }

    pub fn model_for(&self, provider: TranslationProvider) -> String {
        match self.get_provider_config(provider) {
            Some(config) if !config.model.is_empty() => config.model.clone(),
            _ => default_model(provider),
        }
    }

    pub fn api_key_for(&self, provider: TranslationProvider) -> String {
        self.get_provider_config(provider)
            .map(|c| c.api_key.clone())
            .unwrap_or_default()
    }

    pub fn endpoint_for(&self, provider: TranslationProvider) -> String {
        match self.get_provider_config(provider) {
            Some(config) if !config.endpoint.is_empty() => config.endpoint.clone(),
            _ => default_endpoint(provider),
        }
    }

    pub fn timeout_secs_for(&self, provider: TranslationProvider) -> u64 {
        self.get_provider_config(provider)
            .map_or(default_timeout_secs(), |c| c.timeout_secs)
    }

    /// Batch size for a provider, honouring the common override
    pub fn batch_size_for(&self, provider: TranslationProvider) -> usize {
        self.common.batch_size.unwrap_or_else(|| provider.default_batch_size())
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: TranslationProvider::ALL
                .into_iter()
                .map(ProviderConfig::new)
                .collect(),
            common: TranslationCommonConfig::default(),
        }
    }
}
