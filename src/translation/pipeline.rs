/*!
 * Request handling for translated subtitles.
 *
 * A request resolves to a cache file. Finished files are served as they are;
 * otherwise the pipeline admits a job for the request's key, writes a
 * "translating" placeholder, picks a source subtitle and hands the rest to a
 * background task that downloads, translates and stores the result.
 */

use log::{debug, error, info};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::app_config::{Config, TranslationConfig, TranslationProvider};
use crate::errors::{ProviderError, TranslationError};
use crate::file_utils::{self, FileManager, MediaKind, SubtitlePathResolver};
use crate::language_utils;
use crate::providers::{self, BackendSettings, SubtitleCandidate, SubtitleSource, TranslationBackend};
use crate::subtitle_processor::{self, SubtitleDocument};

use super::batch::BatchTranslator;
use super::cache_state::{self, CacheDecision, CacheState, PlaceholderMarker};
use super::registry::{Job, JobGuard, JobKey, JobRegistry};
use super::retry::RetryPolicy;

/// Builds a backend from resolved settings
pub type BackendFactory =
    Arc<dyn Fn(&BackendSettings) -> Result<Arc<dyn TranslationBackend>, ProviderError> + Send + Sync>;

/// A request for a translated subtitle
#[derive(Clone, PartialEq, Eq)]
pub struct SubtitleRequest {
    pub kind: MediaKind,
    pub title_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub target_language: String,
    pub provider: TranslationProvider,
    /// API key overriding the configured one
    pub api_key: Option<String>,
    /// Model overriding the configured one
    pub model: Option<String>,
    /// API base URL overriding the configured one
    pub base_url: Option<String>,
}

impl SubtitleRequest {
    pub fn new(
        kind: MediaKind,
        title_id: impl Into<String>,
        target_language: impl Into<String>,
        provider: TranslationProvider,
    ) -> Self {
        Self {
            kind,
            title_id: title_id.into(),
            season: None,
            episode: None,
            target_language: target_language.into(),
            provider,
            api_key: None,
            model: None,
            base_url: None,
        }
    }

    /// Build a request from a media id such as `tt1234567` or `tt1234567:1:3`
    pub fn from_media_id(
        kind: MediaKind,
        media_id: &str,
        target_language: impl Into<String>,
        provider: TranslationProvider,
    ) -> Result<Self, TranslationError> {
        let mut parts = media_id.trim().split(':');
        let title_id = parts.next().filter(|t| !t.is_empty()).ok_or_else(|| {
            TranslationError::Config(format!("Invalid media id: '{}'", media_id))
        })?;

        let mut number = |name: &str| -> Result<Option<u32>, TranslationError> {
            parts
                .next()
                .map(|p| {
                    p.parse::<u32>().map_err(|_| {
                        TranslationError::Config(format!("Invalid {} in media id '{}'", name, media_id))
                    })
                })
                .transpose()
        };
        let season = number("season")?;
        let episode = number("episode")?;

        let request = Self::new(kind, title_id, target_language, provider);
        Ok(match (season, episode) {
            (Some(season), Some(episode)) => request.with_episode(season, episode),
            _ => request,
        })
    }

    pub fn with_episode(mut self, season: u32, episode: u32) -> Self {
        self.season = Some(season);
        self.episode = Some(episode);
        self
    }

    pub fn with_credentials(
        mut self,
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        self.api_key = api_key;
        self.model = model;
        self.base_url = base_url;
        self
    }

    /// Season and episode as the cache layout uses them; `None` for anything
    /// stored like a movie
    pub fn episode_slot(&self) -> Option<(u32, u32)> {
        file_utils::episode_slot(self.kind, self.season, self.episode)
    }

    /// Dedup key, built from the same numbers that pick the cache path so one
    /// file is never owned by two keys
    pub fn key(&self) -> JobKey {
        let slot = self.episode_slot();
        JobKey::new(
            &self.title_id,
            slot.map(|(season, _)| season),
            slot.map(|(_, episode)| episode),
            &self.target_language,
        )
    }
}

// The API key stays out of logs
impl fmt::Debug for SubtitleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubtitleRequest")
            .field("kind", &self.kind)
            .field("title_id", &self.title_id)
            .field("season", &self.season)
            .field("episode", &self.episode)
            .field("target_language", &self.target_language)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// What the viewer is told about a subtitle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Translated,
    Translating,
    NoSubtitles,
    Failed,
}

impl ResponseStatus {
    /// Label shown in the player's subtitle menu
    pub fn label(&self, target_language: &str) -> String {
        let language = language_utils::display_name(target_language);
        match self {
            Self::Translated => format!("{} (Translated)", language),
            Self::Translating => format!("{} (Translating...)", language),
            Self::NoSubtitles => format!("{} (No subtitles found)", language),
            Self::Failed => format!("{} (Translation failed)", language),
        }
    }
}

/// Answer to a subtitle request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleResponse {
    pub id: String,
    pub path: PathBuf,
    pub url: String,
    pub language: String,
    pub status: ResponseStatus,
    pub label: String,
}

/// Response plus the job it started, if any
#[derive(Debug)]
pub struct PipelineOutcome {
    pub response: SubtitleResponse,
    pub job: Option<JobHandle>,
}

/// Cache inspection without side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheReport {
    pub path: PathBuf,
    pub url: String,
    pub state: CacheState,
    pub job_active: bool,
}

/// Handle to a running job
#[derive(Debug)]
pub struct JobHandle {
    key: JobKey,
    handle: JoinHandle<Result<(), TranslationError>>,
}

impl JobHandle {
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Cancel the job. Its key is released and its downloads are deleted.
    pub fn abort(&self) {
        info!("Cancelling job for {}", self.key);
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to end
    pub async fn wait(self) -> Result<(), TranslationError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(TranslationError::Cancelled),
            Err(e) => {
                let payload = e.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|m| m.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Job for {} panicked: {}", self.key, message);
                Err(TranslationError::JobPanicked(message))
            }
        }
    }
}

/// Entry point tying the cache, the job registry, the subtitle source and the
/// translation backends together
#[derive(Clone)]
pub struct SubtitlePipeline {
    resolver: SubtitlePathResolver,
    base_url: String,
    translation: Arc<TranslationConfig>,
    registry: Arc<dyn JobRegistry>,
    source: Arc<dyn SubtitleSource>,
    backend_factory: BackendFactory,
    // Bounds how many jobs download and translate at once
    job_slots: Arc<Semaphore>,
}

impl fmt::Debug for SubtitlePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubtitlePipeline")
            .field("resolver", &self.resolver)
            .field("base_url", &self.base_url)
            .field("registry", &self.registry)
            .field("source", &self.source)
            .field("free_job_slots", &self.job_slots.available_permits())
            .finish_non_exhaustive()
    }
}

fn registry_error(e: anyhow::Error) -> TranslationError {
    TranslationError::Filesystem(format!("Job registry: {:#}", e))
}

impl SubtitlePipeline {
    pub fn new(config: &Config, registry: Arc<dyn JobRegistry>, source: Arc<dyn SubtitleSource>) -> Self {
        Self {
            resolver: SubtitlePathResolver::new(&config.cache_dir),
            base_url: config.base_url.clone(),
            translation: Arc::new(config.translation.clone()),
            registry,
            source,
            backend_factory: Arc::new(providers::create_backend),
            job_slots: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
        }
    }

    /// Replace how backends are created
    pub fn with_backend_factory(mut self, factory: BackendFactory) -> Self {
        self.backend_factory = factory;
        self
    }

    pub fn registry(&self) -> &Arc<dyn JobRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &SubtitlePathResolver {
        &self.resolver
    }

    /// Cache path for a request
    pub fn resolve_path(&self, request: &SubtitleRequest) -> PathBuf {
        self.resolver.resolve(
            request.provider.display_name(),
            &request.target_language,
            &request.title_id,
            request.kind,
            request.season,
            request.episode,
        )
    }

    fn respond(&self, request: &SubtitleRequest, path: &Path, url: &str, status: ResponseStatus) -> SubtitleResponse {
        SubtitleResponse {
            id: format!("{}-{}-subtitle", request.title_id, request.target_language),
            path: path.to_path_buf(),
            url: url.to_string(),
            language: request.target_language.clone(),
            status,
            label: status.label(&request.target_language),
        }
    }

    /// Inspect the cache for a request without starting anything
    pub fn inspect(&self, request: &SubtitleRequest) -> Result<CacheReport, TranslationError> {
        let path = self.resolve_path(request);
        let url = self
            .resolver
            .public_url(&self.base_url, &path)
            .map_err(|e| TranslationError::Config(format!("{:#}", e)))?;
        let state = cache_state::inspect(&path)?;
        let job_active = self.registry.is_active(&request.key()).map_err(registry_error)?;

        Ok(CacheReport {
            path,
            url,
            state,
            job_active,
        })
    }

    /// Answer a subtitle request, starting a background job when needed
    pub async fn handle_request(&self, request: &SubtitleRequest) -> Result<PipelineOutcome, TranslationError> {
        language_utils::get_language_name(&request.target_language)
            .map_err(|e| TranslationError::Config(format!("{:#}", e)))?;

        let key = request.key();
        let path = self.resolve_path(request);
        let url = self
            .resolver
            .public_url(&self.base_url, &path)
            .map_err(|e| TranslationError::Config(format!("{:#}", e)))?;
        let answer = |status| PipelineOutcome {
            response: self.respond(request, &path, &url, status),
            job: None,
        };

        let state = cache_state::inspect(&path)?;
        match cache_state::decide(&state, self.registry.as_ref(), &key).map_err(registry_error)? {
            CacheDecision::Serve => {
                info!("Serving cached subtitle {:?}", path);
                return Ok(answer(ResponseStatus::Translated));
            }
            CacheDecision::ReportTranslating => {
                info!("Translation already in progress for {}", key);
                return Ok(answer(ResponseStatus::Translating));
            }
            CacheDecision::Start => {}
        }

        let job = Job::new(key.clone(), request.provider.display_name())
            .with_credentials(request.api_key.clone())
            .with_model(request.model.clone())
            .with_source_file_count(1);
        let Some(guard) = JobGuard::admit(Arc::clone(&self.registry), &job).map_err(registry_error)? else {
            return Ok(answer(ResponseStatus::Translating));
        };

        // A job may have stored its result between the first look and admission
        if cache_state::inspect(&path)? == CacheState::Complete {
            debug!("{} finished while being admitted again", key);
            drop(guard);
            return Ok(answer(ResponseStatus::Translated));
        }

        cache_state::write_placeholder(&path, &PlaceholderMarker::Translating)?;

        let slot = request.episode_slot();
        let candidate = match self
            .source
            .search(
                request.kind,
                &request.title_id,
                slot.map(|(season, _)| season),
                slot.map(|(_, episode)| episode),
                &request.target_language,
            )
            .await
        {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                info!("No source subtitles for {}", key);
                cache_state::write_placeholder(&path, &PlaceholderMarker::NoSubtitlesFound)?;
                return Ok(answer(ResponseStatus::NoSubtitles));
            }
            Err(e) => {
                let error = TranslationError::from(e);
                error!("Subtitle search failed for {}: {}", key, error);
                cache_state::write_placeholder(
                    &path,
                    &PlaceholderMarker::TranslationFailed {
                        reason: error.user_message(),
                    },
                )?;
                return Ok(answer(ResponseStatus::Failed));
            }
        };

        info!("Queued {} for translation from '{}' subtitles", key, candidate.lang);
        let pipeline = self.clone();
        let job_request = request.clone();
        let job_path = path.clone();
        let handle = tokio::spawn(async move { pipeline.run_job(job_request, candidate, job_path, guard).await });

        let mut outcome = answer(ResponseStatus::Translating);
        outcome.job = Some(JobHandle { key, handle });
        Ok(outcome)
    }

    // Produces the subtitle and records the outcome; the guard is released last
    async fn run_job(
        self,
        request: SubtitleRequest,
        candidate: SubtitleCandidate,
        path: PathBuf,
        guard: JobGuard,
    ) -> Result<(), TranslationError> {
        let produced = match self.job_slots.acquire().await {
            Ok(_slot) => self.produce(&request, &candidate).await,
            Err(_) => Err(TranslationError::Cancelled),
        };

        let outcome = match produced {
            Ok(document) => {
                info!("Stored translated subtitle {:?}", path);
                cache_state::write_document(&path, &document)
            }
            Err(e) => {
                error!("Translation job for {} failed: {}", guard.key(), e);
                let marker = PlaceholderMarker::TranslationFailed {
                    reason: e.user_message(),
                };
                if let Err(write_error) = cache_state::write_placeholder(&path, &marker) {
                    error!("Failed to record failure for {}: {}", guard.key(), write_error);
                }
                Err(e)
            }
        };

        drop(guard);
        outcome
    }

    // Download to a temporary file, parse, translate unless already in the target language
    async fn produce(
        &self,
        request: &SubtitleRequest,
        candidate: &SubtitleCandidate,
    ) -> Result<SubtitleDocument, TranslationError> {
        let bytes = self.source.download(candidate).await?;

        let download_dir = self.resolver.download_dir(&request.target_language, &request.title_id);
        FileManager::ensure_dir(&download_dir).map_err(|e| TranslationError::Filesystem(format!("{:#}", e)))?;
        let mut download = tempfile::Builder::new()
            .prefix("source-")
            .suffix(".srt")
            .tempfile_in(&download_dir)?;
        download.write_all(&bytes)?;
        download.flush()?;

        let raw = FileManager::read_to_string_lossy(download.path())
            .map_err(|e| TranslationError::Filesystem(format!("{:#}", e)))?;
        let document = subtitle_processor::parse(&raw)?;

        if language_utils::language_codes_match(&candidate.lang, &request.target_language) {
            info!("Source subtitle is already in {}, storing it as is", request.target_language);
            return Ok(document);
        }

        let settings = BackendSettings::from_config(&self.translation, request.provider).with_overrides(
            request.api_key.as_deref(),
            request.model.as_deref(),
            request.base_url.as_deref(),
        );
        let backend = (self.backend_factory)(&settings)?;
        let batch_size = self.translation.batch_size_for(request.provider);

        BatchTranslator::new(backend, batch_size, RetryPolicy::from_config(&self.translation.common))
            .translate(&document, &request.target_language)
            .await
    }
}
