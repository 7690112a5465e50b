/*!
 * Common test utilities for the autosubs test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;
use tempfile::TempDir;

use autosubs::app_config::Config;
use autosubs::providers::mock::{MockBackend, MockSubtitleSource};
use autosubs::providers::{BackendSettings, TranslationBackend};
use autosubs::translation::{InMemoryJobRegistry, JobRegistry, SubtitlePipeline};
use autosubs::ProviderError;

/// A three-cue English subtitle
pub const SAMPLE_SRT: &str = "1
00:00:01,000 --> 00:00:04,000
This is a test subtitle.

2
00:00:05,000 --> 00:00:09,000
It contains multiple entries.

3
00:00:10,000 --> 00:00:14,000
For testing purposes.
";

/// Routes library logs through the test harness; honours RUST_LOG
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Config pointing the cache at `dir`, with millisecond backoff
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.cache_dir = dir.to_path_buf();
    config.translation.common.retry_backoff_ms = 1;
    config.translation.common.retry_backoff_cap_ms = 2;
    config
}

/// Pipeline whose every job uses `backend`
pub fn pipeline_with_registry(
    dir: &Path,
    registry: Arc<dyn JobRegistry>,
    source: MockSubtitleSource,
    backend: MockBackend,
) -> SubtitlePipeline {
    let backend = Arc::new(backend);
    SubtitlePipeline::new(&test_config(dir), registry, Arc::new(source)).with_backend_factory(Arc::new(
        move |_settings: &BackendSettings| {
            Ok::<_, ProviderError>(Arc::clone(&backend) as Arc<dyn TranslationBackend>)
        },
    ))
}

/// Pipeline with an in-memory registry
pub fn pipeline_with(dir: &Path, source: MockSubtitleSource, backend: MockBackend) -> SubtitlePipeline {
    pipeline_with_registry(dir, Arc::new(InMemoryJobRegistry::new()), source, backend)
}

/// Uppercases every text, standing in for a real translation
pub fn shout(text: &str, _target: &str) -> String {
    text.to_uppercase()
}
