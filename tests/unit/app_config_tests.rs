/*!
 * Tests for application configuration functionality
 */

use std::str::FromStr;

use autosubs::app_config::{Config, LogLevel, ProviderConfig, TranslationProvider};

/// Test default configuration values
#[test]
fn test_defaultConfig_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.target_language, "en");
    assert_eq!(config.translation.provider, TranslationProvider::Google);
    assert_eq!(config.translation.common.retry_count, 3);
    assert_eq!(config.translation.common.retry_backoff_ms, 1000);
    assert_eq!(config.translation.common.retry_backoff_cap_ms, 10_000);
    assert_eq!(config.stale_job_after_secs, 1800);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.validate().is_ok());
}

#[test]
fn test_configValidation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();

    config.target_language = "zz".to_string();
    assert!(config.validate().is_err());
    config.target_language = "fr".to_string();

    // Keyed providers need a key
    config.translation.provider = TranslationProvider::ChatGpt;
    assert!(config.validate().is_err());

    let mut chatgpt = ProviderConfig::new(TranslationProvider::ChatGpt);
    chatgpt.api_key = "sk-test".to_string();
    config.translation.available_providers.retain(|p| p.provider_type != "chatgpt");
    config.translation.available_providers.push(chatgpt);
    assert!(config.validate().is_ok());

    config.translation.common.batch_size = Some(0);
    assert!(config.validate().is_err());
    config.translation.common.batch_size = Some(10);

    config.translation.common.retry_count = 0;
    assert!(config.validate().is_err());
    config.translation.common.retry_count = 1;

    config.max_concurrent_jobs = 0;
    assert!(config.validate().is_err());
    config.max_concurrent_jobs = 1;

    config.base_url = "::not a url::".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_deserialize_withMinimalJson_shouldFillDefaults() {
    let json = r#"{
        "target_language": "pt",
        "translation": {
            "provider": "deepseek",
            "available_providers": [
                { "type": "deepseek", "api_key": "ds-key" }
            ],
            "common": { "batch_size": 12 }
        }
    }"#;

    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.translation.provider, TranslationProvider::DeepSeek);
    assert_eq!(config.translation.get_api_key(), "ds-key");
    assert_eq!(config.translation.model_for(TranslationProvider::DeepSeek), "deepseek-chat");
    assert_eq!(config.translation.endpoint_for(TranslationProvider::DeepSeek), "https://api.deepseek.com");
    assert_eq!(config.translation.batch_size_for(TranslationProvider::DeepSeek), 12);
    assert_eq!(config.translation.common.retry_count, 3);
    assert_eq!(config.source.endpoint, "https://opensubtitles-v3.strem.io");
    assert!(config.validate().is_ok());
}

#[test]
fn test_serialize_thenDeserialize_shouldPreserveProvider() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::GoogleApi;

    let json = serde_json::to_string_pretty(&config).unwrap();
    assert!(json.contains("\"googleapi\""));

    let restored: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.translation.provider, TranslationProvider::GoogleApi);
}

#[test]
fn test_translationProvider_fromStr_shouldAcceptIdsAndDisplayNames() {
    for provider in TranslationProvider::ALL {
        assert_eq!(TranslationProvider::from_str(&provider.to_lowercase_string()).unwrap(), provider);
        assert_eq!(TranslationProvider::from_str(provider.display_name()).unwrap(), provider);
    }
    assert!(TranslationProvider::from_str("babelfish").is_err());
}

#[test]
fn test_defaultBatchSize_shouldDependOnProvider() {
    let config = Config::default();

    assert_eq!(config.translation.batch_size_for(TranslationProvider::Google), 25);
    assert_eq!(config.translation.batch_size_for(TranslationProvider::GoogleApi), 50);
    assert_eq!(config.translation.batch_size_for(TranslationProvider::Gemini), 40);
}
