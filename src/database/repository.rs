/*!
 * Persistent job registry.
 *
 * Admission relies on the `translation_jobs` primary key: an insert either
 * creates the row or is ignored, in a single statement, so two processes
 * sharing the database file can never both admit the same key.
 */

use anyhow::Result;
use chrono::{Duration, Utc};
use log::{debug, info};
use rusqlite::params;

use crate::translation::registry::{Job, JobKey, JobRegistry};

use super::connection::DatabaseConnection;
use super::models::{format_timestamp, JobRecord};

/// Job registry backed by SQLite
#[derive(Debug, Clone)]
pub struct SqliteJobRegistry {
    /// Database connection
    db: DatabaseConnection,
}

impl SqliteJobRegistry {
    /// Create a new registry with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a registry with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Remove jobs admitted more than `max_age` ago.
    ///
    /// Such rows belong to a process that died mid-job; without this their keys
    /// would stay blocked forever. A job still running past `max_age` loses its
    /// row too, but its later release leaves any successor's row alone.
    pub fn reclaim_stale(&self, max_age: Duration) -> Result<usize> {
        // An age reaching past the representable range means nothing is stale
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age).map(format_timestamp) else {
            return Ok(0);
        };
        let removed = self.db.execute_blocking(|conn| {
            Ok(conn.execute("DELETE FROM translation_jobs WHERE created_at < ?1", params![cutoff])?)
        })?;

        if removed > 0 {
            info!("Reclaimed {} stale job(s)", removed);
        }
        Ok(removed)
    }

    /// Active jobs, without blocking the async runtime
    pub async fn active_jobs_async(&self) -> Result<Vec<Job>> {
        let records = self
            .db
            .execute_async(|conn| {
                let mut stmt = conn.prepare("SELECT * FROM translation_jobs ORDER BY created_at")?;
                let records = stmt
                    .query_map([], JobRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await?;

        records.into_iter().map(JobRecord::into_job).collect()
    }
}

impl JobRegistry for SqliteJobRegistry {
    fn try_admit(&self, job: &Job) -> Result<bool> {
        let record = JobRecord::from_job(job);
        let inserted = self.db.execute_blocking(|conn| {
            Ok(conn.execute(
                r#"
                INSERT OR IGNORE INTO translation_jobs (
                    job_key, job_id, title_id, season, episode, target_language,
                    provider, model, source_file_count, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    record.job_key,
                    record.job_id,
                    record.title_id,
                    record.season,
                    record.episode,
                    record.target_language,
                    record.provider,
                    record.model,
                    record.source_file_count,
                    record.created_at,
                ],
            )?)
        })?;

        debug!("Admission of {}: {}", job.key, inserted == 1);
        Ok(inserted == 1)
    }

    fn is_active(&self, key: &JobKey) -> Result<bool> {
        let storage_key = key.storage_key();
        self.db.execute_blocking(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM translation_jobs WHERE job_key = ?1",
                params![storage_key],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    fn release(&self, key: &JobKey, job_id: &str) -> Result<()> {
        let storage_key = key.storage_key();
        let removed = self.db.execute_blocking(|conn| {
            Ok(conn.execute(
                "DELETE FROM translation_jobs WHERE job_key = ?1 AND job_id = ?2",
                params![storage_key, job_id],
            )?)
        })?;

        if removed == 0 {
            debug!("Job {} no longer owns {}", job_id, key);
        }
        Ok(())
    }

    fn active_jobs(&self) -> Result<Vec<Job>> {
        let records = self.db.execute_blocking(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM translation_jobs ORDER BY created_at")?;
            let records = stmt
                .query_map([], JobRecord::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })?;

        records.into_iter().map(JobRecord::into_job).collect()
    }
}
