/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;

use crate::translation::registry::{Job, JobKey};

/// A row of `translation_jobs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub job_key: String,
    pub job_id: String,
    pub title_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub target_language: String,
    pub provider: String,
    pub model: Option<String>,
    pub source_file_count: u32,
    /// RFC 3339, UTC, fixed width so text comparison orders by time
    pub created_at: String,
}

/// Timestamp format stored in `created_at`
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl JobRecord {
    /// Credentials are dropped; they only live in memory
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_key: job.key.storage_key(),
            job_id: job.id.clone(),
            title_id: job.key.title_id.clone(),
            season: job.key.season,
            episode: job.key.episode,
            target_language: job.key.target_language.clone(),
            provider: job.provider.clone(),
            model: job.model.clone(),
            source_file_count: job.source_file_count,
            created_at: format_timestamp(job.created_at),
        }
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            job_key: row.get("job_key")?,
            job_id: row.get("job_id")?,
            title_id: row.get("title_id")?,
            season: row.get("season")?,
            episode: row.get("episode")?,
            target_language: row.get("target_language")?,
            provider: row.get("provider")?,
            model: row.get("model")?,
            source_file_count: row.get("source_file_count")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn into_job(self) -> Result<Job> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| anyhow::anyhow!("Invalid created_at '{}': {}", self.created_at, e))?
            .with_timezone(&Utc);

        Ok(Job {
            id: self.job_id,
            key: JobKey::new(self.title_id, self.season, self.episode, self.target_language),
            provider: self.provider,
            credentials: None,
            model: self.model,
            source_file_count: self.source_file_count,
            created_at,
        })
    }
}
