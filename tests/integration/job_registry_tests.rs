/*!
 * Integration tests for the SQLite-backed job registry
 */

use std::sync::Arc;
use anyhow::Result;

use autosubs::app_config::TranslationProvider;
use autosubs::database::{DatabaseConnection, SqliteJobRegistry};
use autosubs::file_utils::MediaKind;
use autosubs::providers::mock::{MockBackend, MockSubtitleSource};
use autosubs::translation::{CacheState, Job, JobGuard, JobKey, JobRegistry, ResponseStatus, SubtitleRequest};
use crate::common::{self, SAMPLE_SRT};

fn movie_request() -> SubtitleRequest {
    SubtitleRequest::new(MediaKind::Movie, "tt0111161", "pt", TranslationProvider::Google)
}

#[tokio::test]
async fn test_sharedDatabase_shouldDedupAcrossPipelines() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("jobs.db");
    let cache = temp_dir.path().join("cache");

    // Two registries on one file stand in for two processes
    let first_registry = Arc::new(SqliteJobRegistry::new(DatabaseConnection::new(&db_path)?));
    let second_registry = Arc::new(SqliteJobRegistry::new(DatabaseConnection::new(&db_path)?));

    let first = common::pipeline_with_registry(
        &cache,
        first_registry,
        MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT),
        MockBackend::slow(150),
    );
    let second_source = MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT);
    let second = common::pipeline_with_registry(
        &cache,
        second_registry.clone(),
        second_source.clone(),
        MockBackend::working(),
    );

    let running = first.handle_request(&movie_request()).await?;
    let duplicate = second.handle_request(&movie_request()).await?;

    assert!(running.job.is_some());
    assert!(duplicate.job.is_none());
    assert_eq!(duplicate.response.status, ResponseStatus::Translating);
    assert_eq!(second_source.search_count(), 0);
    assert!(second_registry.is_active(&movie_request().key())?);

    running.job.expect("job should start").wait().await?;

    assert!(!second_registry.is_active(&movie_request().key())?);
    let served = second.handle_request(&movie_request()).await?;
    assert_eq!(served.response.status, ResponseStatus::Translated);
    Ok(())
}

#[tokio::test]
async fn test_staleRow_afterReclaim_shouldAllowRestart() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let registry = Arc::new(SqliteJobRegistry::new(DatabaseConnection::new(temp_dir.path().join("jobs.db"))?));

    // A process died while holding the key
    let mut abandoned = Job::new(movie_request().key(), "Google Translate");
    abandoned.created_at = chrono::Utc::now() - chrono::Duration::hours(3);
    assert!(registry.try_admit(&abandoned)?);

    let pipeline = common::pipeline_with_registry(
        &temp_dir.path().join("cache"),
        registry.clone(),
        MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT),
        MockBackend::working(),
    );

    let blocked = pipeline.handle_request(&movie_request()).await?;
    assert!(blocked.job.is_none());

    assert_eq!(registry.reclaim_stale(chrono::Duration::minutes(30))?, 1);

    let restarted = pipeline.handle_request(&movie_request()).await?;
    restarted.job.expect("job should start").wait().await?;
    assert_eq!(pipeline.inspect(&movie_request())?.state, CacheState::Complete);
    Ok(())
}

#[test]
fn test_jobGuard_withSqliteRegistry_shouldReleaseOnDrop() -> Result<()> {
    let registry: Arc<dyn JobRegistry> = Arc::new(SqliteJobRegistry::new_in_memory()?);
    let key = JobKey::new("tt0944947", Some(2), Some(1), "de");

    {
        let guard = JobGuard::admit(Arc::clone(&registry), &Job::new(key.clone(), "Mock"))?;
        assert!(guard.is_some());
        assert!(JobGuard::admit(Arc::clone(&registry), &Job::new(key.clone(), "Mock"))?.is_none());
    }

    assert!(!registry.is_active(&key)?);
    assert!(registry.active_jobs()?.is_empty());
    Ok(())
}

#[test]
fn test_persistedJob_shouldNotStoreCredentials() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("jobs.db");
    let registry = SqliteJobRegistry::new(DatabaseConnection::new(&db_path)?);

    let job = Job::new(JobKey::new("tt0111161", None, None, "pt"), "ChatGPT API")
        .with_credentials(Some("sk-very-secret".to_string()));
    registry.try_admit(&job)?;

    // The row may still sit in the write-ahead log
    let needle = b"sk-very-secret";
    for entry in std::fs::read_dir(temp_dir.path())? {
        let raw = std::fs::read(entry?.path())?;
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    let stored = registry.active_jobs()?;
    assert_eq!(stored[0].credentials, None);
    Ok(())
}
