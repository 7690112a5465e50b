/*!
 * Integration tests for the subtitle request workflow
 */

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use anyhow::Result;
use parking_lot::Mutex;

use autosubs::app_config::TranslationProvider;
use autosubs::file_utils::MediaKind;
use autosubs::providers::mock::{MockBackend, MockSubtitleSource};
use autosubs::providers::{BackendSettings, TranslationBackend};
use autosubs::translation::{
    cache_state, CacheState, InMemoryJobRegistry, Job, JobKey, JobRegistry, PlaceholderMarker, ResponseStatus,
    SubtitlePipeline, SubtitleRequest,
};
use autosubs::{ProviderError, TranslationError};
use crate::common::{self, SAMPLE_SRT};

fn episode_request() -> SubtitleRequest {
    SubtitleRequest::new(MediaKind::Series, "tt0944947", "es", TranslationProvider::Google).with_episode(1, 3)
}

/// Registry whose first `is_active` lookup lets another worker finish the
/// file and release its key, as if it won the race right then
#[derive(Debug)]
struct FinishingElsewhereRegistry {
    inner: InMemoryJobRegistry,
    path: PathBuf,
    finished: AtomicBool,
}

impl JobRegistry for FinishingElsewhereRegistry {
    fn try_admit(&self, job: &Job) -> anyhow::Result<bool> {
        self.inner.try_admit(job)
    }

    fn is_active(&self, key: &JobKey) -> anyhow::Result<bool> {
        if !self.finished.swap(true, Ordering::SeqCst) {
            fs::write(&self.path, SAMPLE_SRT)?;
        }
        self.inner.is_active(key)
    }

    fn release(&self, key: &JobKey, job_id: &str) -> anyhow::Result<()> {
        self.inner.release(key, job_id)
    }

    fn active_jobs(&self) -> anyhow::Result<Vec<Job>> {
        self.inner.active_jobs()
    }
}

#[tokio::test]
async fn test_episodeRequest_shouldTranslateIntoSeasonLayout() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let backend = MockBackend::working().with_custom_response(common::shout);
    let pipeline = common::pipeline_with(
        temp_dir.path(),
        MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT),
        backend.clone(),
    );

    let outcome = pipeline.handle_request(&episode_request()).await?;
    assert_eq!(
        outcome.response.path,
        temp_dir.path().join("Google Translate/es/tt0944947/season1/tt0944947-translated-3-1.srt")
    );
    assert_eq!(
        outcome.response.url,
        "http://127.0.0.1:7000/subtitles/Google%20Translate/es/tt0944947/season1/tt0944947-translated-3-1.srt"
    );
    assert_eq!(outcome.response.label, "Spanish (Translating...)");

    // Placeholder is in place while the job runs
    let placeholder = fs::read_to_string(&outcome.response.path)?;
    assert!(placeholder.contains("00:00:00,000 --> 00:00:00,000"));

    outcome.job.expect("job should start").wait().await?;

    let stored = fs::read_to_string(&outcome.response.path)?;
    assert!(stored.contains("00:00:05,000 --> 00:00:09,000\nIT CONTAINS MULTIPLE ENTRIES."));
    assert_eq!(stored.matches("-->").count(), 3);

    let report = pipeline.inspect(&episode_request())?;
    assert_eq!(report.state, CacheState::Complete);
    assert!(!report.job_active);
    Ok(())
}

#[tokio::test]
async fn test_concurrentRequests_shouldStartExactlyOneJob() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let source = MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT);
    let pipeline = common::pipeline_with(temp_dir.path(), source.clone(), MockBackend::slow(100));
    let request = episode_request();

    let outcomes = futures::future::join_all((0..6).map(|_| pipeline.handle_request(&request))).await;

    let mut jobs = Vec::new();
    for outcome in outcomes {
        let outcome = outcome?;
        assert_eq!(outcome.response.status, ResponseStatus::Translating);
        jobs.extend(outcome.job);
    }
    assert_eq!(jobs.len(), 1);
    assert_eq!(source.search_count(), 1);

    for job in jobs {
        job.wait().await?;
    }
    assert_eq!(pipeline.inspect(&request)?.state, CacheState::Complete);
    Ok(())
}

#[tokio::test]
async fn test_failedDownload_shouldLeaveFailurePlaceholderThenRecover() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let registry = Arc::new(InMemoryJobRegistry::new());

    let broken = MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT)
        .with_download_error(ProviderError::ConnectionError("reset by peer".to_string()));
    let pipeline = common::pipeline_with_registry(temp_dir.path(), registry.clone(), broken, MockBackend::working());

    let outcome = pipeline.handle_request(&episode_request()).await?;
    let err = outcome.job.expect("job should start").wait().await.unwrap_err();
    assert!(matches!(err, TranslationError::Network(_)));

    let report = pipeline.inspect(&episode_request())?;
    assert!(matches!(
        report.state,
        CacheState::Placeholder(PlaceholderMarker::TranslationFailed { .. })
    ));
    assert!(!report.job_active);

    // A later request with a healthy source replaces the failure
    let healthy = MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT);
    let pipeline = common::pipeline_with_registry(temp_dir.path(), registry, healthy, MockBackend::working());
    let retry = pipeline.handle_request(&episode_request()).await?;
    retry.job.expect("job should restart").wait().await?;

    assert_eq!(pipeline.inspect(&episode_request())?.state, CacheState::Complete);
    Ok(())
}

#[tokio::test]
async fn test_noSubtitles_shouldAskSourceAgainOnNextRequest() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let source = MockSubtitleSource::empty();
    let pipeline = common::pipeline_with(temp_dir.path(), source.clone(), MockBackend::working());

    let first = pipeline.handle_request(&episode_request()).await?;
    let second = pipeline.handle_request(&episode_request()).await?;

    assert_eq!(first.response.status, ResponseStatus::NoSubtitles);
    assert_eq!(second.response.label, "Spanish (No subtitles found)");
    assert_eq!(source.search_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_requestCredentials_shouldReachBackendFactory() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let seen: Arc<Mutex<Vec<BackendSettings>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);

    let pipeline = SubtitlePipeline::new(
        &common::test_config(temp_dir.path()),
        Arc::new(InMemoryJobRegistry::new()),
        Arc::new(MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT)),
    )
    .with_backend_factory(Arc::new(move |settings: &BackendSettings| {
        captured.lock().push(settings.clone());
        Ok::<_, ProviderError>(Arc::new(MockBackend::working()) as Arc<dyn TranslationBackend>)
    }));

    let request = SubtitleRequest::new(MediaKind::Movie, "tt0111161", "it", TranslationProvider::DeepSeek)
        .with_credentials(
            Some("sk-request".to_string()),
            Some("deepseek-reasoner".to_string()),
            Some("http://localhost:9999".to_string()),
        );

    let outcome = pipeline.handle_request(&request).await?;
    outcome.job.expect("job should start").wait().await?;

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].provider, TranslationProvider::DeepSeek);
    assert_eq!(seen[0].api_key, "sk-request");
    assert_eq!(seen[0].model, "deepseek-reasoner");
    assert_eq!(seen[0].endpoint, "http://localhost:9999");
    Ok(())
}

#[tokio::test]
async fn test_missingApiKey_shouldFailJobWithoutCallingBackend() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    // The default factory refuses keyed providers without a key
    let pipeline = SubtitlePipeline::new(
        &common::test_config(temp_dir.path()),
        Arc::new(InMemoryJobRegistry::new()),
        Arc::new(MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT)),
    );
    let request = SubtitleRequest::new(MediaKind::Movie, "tt0111161", "it", TranslationProvider::Gemini);

    let outcome = pipeline.handle_request(&request).await?;
    let err = outcome.job.expect("job should start").wait().await.unwrap_err();

    assert!(matches!(err, TranslationError::Authentication(_)));
    match pipeline.inspect(&request)?.state {
        CacheState::Placeholder(PlaceholderMarker::TranslationFailed { reason }) => {
            assert_eq!(reason, "Translation failed. Invalid API key. Please check your configuration.");
        }
        other => panic!("unexpected state: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_jobFinishingDuringAdmission_shouldServeItsResult() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::pipeline_with(temp_dir.path(), MockSubtitleSource::empty(), MockBackend::working())
        .resolve_path(&episode_request());
    cache_state::write_placeholder(&path, &PlaceholderMarker::Translating)?;

    let registry = Arc::new(FinishingElsewhereRegistry {
        inner: InMemoryJobRegistry::new(),
        path: path.clone(),
        finished: AtomicBool::new(false),
    });
    let source = MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT);
    let backend = MockBackend::working();
    let pipeline = common::pipeline_with_registry(temp_dir.path(), registry.clone(), source.clone(), backend.clone());

    let outcome = pipeline.handle_request(&episode_request()).await?;

    assert!(outcome.job.is_none());
    assert_eq!(outcome.response.status, ResponseStatus::Translated);
    assert_eq!(fs::read_to_string(&path)?, SAMPLE_SRT);
    assert_eq!(source.search_count(), 0);
    assert_eq!(backend.request_count(), 0);
    assert!(!registry.is_active(&episode_request().key())?);
    Ok(())
}

#[tokio::test]
async fn test_requestsForSameFile_shouldShareOneJob() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let source = MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT);
    let pipeline = common::pipeline_with(temp_dir.path(), source.clone(), MockBackend::slow(100));

    // A season-zero episode is stored like the movie itself
    let movie = SubtitleRequest::new(MediaKind::Movie, "tt0944947", "es", TranslationProvider::Google);
    let special = SubtitleRequest::new(MediaKind::Series, "tt0944947", "es", TranslationProvider::Google).with_episode(0, 4);

    let first = pipeline.handle_request(&movie).await?;
    let second = pipeline.handle_request(&special).await?;

    assert_eq!(first.response.path, second.response.path);
    assert!(second.job.is_none());
    assert_eq!(second.response.status, ResponseStatus::Translating);
    assert_eq!(source.search_count(), 1);

    first.job.expect("job should start").wait().await?;
    assert_eq!(pipeline.inspect(&special)?.state, CacheState::Complete);
    Ok(())
}

#[tokio::test]
async fn test_singleJobSlot_shouldStillFinishEveryQueuedJob() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::test_config(temp_dir.path());
    config.max_concurrent_jobs = 1;
    let backend = Arc::new(MockBackend::slow(30));
    let factory_backend = Arc::clone(&backend);
    let pipeline = SubtitlePipeline::new(
        &config,
        Arc::new(InMemoryJobRegistry::new()),
        Arc::new(MockSubtitleSource::with_subtitle("eng", SAMPLE_SRT)),
    )
    .with_backend_factory(Arc::new(move |_settings: &BackendSettings| {
        Ok::<_, ProviderError>(Arc::clone(&factory_backend) as Arc<dyn TranslationBackend>)
    }));

    let requests: Vec<_> = (1..=3).map(|episode| episode_request().with_episode(2, episode)).collect();
    let mut jobs = Vec::new();
    for request in &requests {
        jobs.extend(pipeline.handle_request(request).await?.job);
    }
    assert_eq!(jobs.len(), 3);
    for job in jobs {
        job.wait().await?;
    }

    for request in &requests {
        assert_eq!(pipeline.inspect(request)?.state, CacheState::Complete);
    }
    assert_eq!(backend.peak_concurrency(), 1);
    Ok(())
}
