/*!
 * Job registry and deduplication guard.
 *
 * At most one translation job may be active per `JobKey`. Admission is a
 * single atomic check-and-insert; a `JobGuard` owns the admission and gives
 * the key back when it is dropped, whichever way the job ends.
 */

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of a translation job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub title_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub target_language: String,
}

impl JobKey {
    pub fn new(
        title_id: impl Into<String>,
        season: Option<u32>,
        episode: Option<u32>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            title_id: title_id.into(),
            season,
            episode,
            target_language: target_language.into(),
        }
    }

    /// Single-string form used as a primary key.
    ///
    /// The title is length-prefixed and absent numbers are spelled `-`, so no
    /// title or language content can make two keys collide.
    pub fn storage_key(&self) -> String {
        let number = |n: Option<u32>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
        format!(
            "{}:{}|{}|{}|{}",
            self.title_id.len(),
            self.title_id,
            number(self.season),
            number(self.episode),
            self.target_language
        )
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title_id)?;
        if let (Some(season), Some(episode)) = (self.season, self.episode) {
            write!(f, ":{}:{}", season, episode)?;
        }
        write!(f, "@{}", self.target_language)
    }
}

// @struct: An admitted translation job
#[derive(Clone)]
pub struct Job {
    // @field: Unique id of this run
    pub id: String,

    // @field: Dedup key
    pub key: JobKey,

    // @field: Provider display name
    pub provider: String,

    // @field: API key supplied with the request; never persisted
    pub credentials: Option<String>,

    // @field: Model requested, if any
    pub model: Option<String>,

    // @field: Downloaded source files owned by the job
    pub source_file_count: u32,

    // @field: Admission time
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(key: JobKey, provider: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key,
            provider: provider.into(),
            credentials: None,
            model: None,
            source_file_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<String>) -> Self {
        self.credentials = credentials.filter(|c| !c.is_empty());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.is_empty());
        self
    }

    pub fn with_source_file_count(mut self, count: u32) -> Self {
        self.source_file_count = count;
        self
    }
}

// Credentials stay out of logs
impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("provider", &self.provider)
            .field("credentials", &self.credentials.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("source_file_count", &self.source_file_count)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Admission control for translation jobs
pub trait JobRegistry: Send + Sync + fmt::Debug {
    /// Atomically register `job` unless a job with the same key is active.
    /// Returns whether the job was admitted.
    fn try_admit(&self, job: &Job) -> Result<bool>;

    /// Whether a job is active for `key`
    fn is_active(&self, key: &JobKey) -> Result<bool>;

    /// Forget job `job_id` under `key`. A key that is inactive or now held by
    /// another job is left as it is.
    fn release(&self, key: &JobKey, job_id: &str) -> Result<()>;

    /// All active jobs, oldest first
    fn active_jobs(&self) -> Result<Vec<Job>>;
}

/// Process-local registry
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: Mutex<HashMap<JobKey, Job>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn try_admit(&self, job: &Job) -> Result<bool> {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&job.key) {
            return Ok(false);
        }
        jobs.insert(job.key.clone(), job.clone());
        Ok(true)
    }

    fn is_active(&self, key: &JobKey) -> Result<bool> {
        Ok(self.jobs.lock().contains_key(key))
    }

    fn release(&self, key: &JobKey, job_id: &str) -> Result<()> {
        let mut jobs = self.jobs.lock();
        if jobs.get(key).is_some_and(|job| job.id == job_id) {
            jobs.remove(key);
        }
        Ok(())
    }

    fn active_jobs(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

/// Holds an admitted job and releases its key on drop
#[derive(Debug)]
pub struct JobGuard {
    registry: Arc<dyn JobRegistry>,
    key: JobKey,
    job_id: String,
    released: bool,
}

impl JobGuard {
    /// Try to admit `job`; `None` means another job already owns the key
    pub fn admit(registry: Arc<dyn JobRegistry>, job: &Job) -> Result<Option<Self>> {
        if !registry.try_admit(job)? {
            debug!("Job for {} already active", job.key);
            return Ok(None);
        }
        debug!("Admitted job {} for {}", job.id, job.key);
        Ok(Some(Self {
            registry,
            key: job.key.clone(),
            job_id: job.id.clone(),
            released: false,
        }))
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Release now and report the registry's answer
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.registry.release(&self.key, &self.job_id)
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.registry.release(&self.key, &self.job_id) {
            Ok(()) => debug!("Released job key {}", self.key),
            Err(e) => error!("Failed to release job key {}: {}", self.key, e),
        }
    }
}
