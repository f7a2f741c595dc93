//! Job write operations: enqueue, claim, state changes.

use anyhow::Result;
use sqlx::Row;

use super::super::db::{unix_timestamp, Store};
use super::super::types::{JobId, JobState, NewJob};

impl Store {
    /// Insert a new queued job.
    pub async fn enqueue_job(&self, job: &NewJob) -> Result<JobId> {
        let now = unix_timestamp();
        let id = sqlx::query(
            r#"
            INSERT INTO jobs (
                user_id, chat_id, message_id, url, platform, title,
                spec_json, state, error_msg, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10)
            "#,
        )
        .bind(job.user_id)
        .bind(job.chat_id)
        .bind(job.message_id)
        .bind(&job.url)
        .bind(&job.platform)
        .bind(&job.title)
        .bind(&job.spec_json)
        .bind(JobState::Queued.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Atomically claim the oldest claimable queued job by setting it to Running.
    ///
    /// A job is claimable when its user has fewer than `max_per_user` running
    /// jobs and its platform is not in `excluded_platforms`. Returns None when
    /// nothing qualifies.
    pub async fn claim_next_queued_job(
        &self,
        max_per_user: usize,
        excluded_platforms: &[String],
    ) -> Result<Option<JobId>> {
        let excluded = serde_json::to_string(excluded_platforms)?;
        // Pick and mark in one statement; the write lock is taken up front.
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'running',
                updated_at = ?1
            WHERE id = (
                SELECT j.id FROM jobs j
                WHERE j.state = 'queued'
                  AND j.platform NOT IN (SELECT value FROM json_each(?2))
                  AND (SELECT COUNT(*) FROM jobs r
                       WHERE r.user_id = j.user_id AND r.state = 'running') < ?3
                ORDER BY j.id ASC
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(unix_timestamp())
        .bind(excluded)
        .bind(max_per_user.max(1) as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    pub async fn set_job_state(&self, id: JobId, state: JobState) -> Result<()> {
        sqlx::query("UPDATE jobs SET state = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(state.as_str())
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark a job failed with a reason.
    pub async fn set_job_error(&self, id: JobId, message: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET state = 'failed', error_msg = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(message)
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remember the chat message that shows this job's progress.
    pub async fn set_job_message(&self, id: JobId, message_id: i32) -> Result<()> {
        sqlx::query("UPDATE jobs SET message_id = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(message_id)
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Normalize any job left in `running` to `queued` (e.g. after a crash).
    /// Returns the number of jobs reset.
    pub async fn recover_running_jobs(&self) -> Result<u64> {
        let r = sqlx::query("UPDATE jobs SET state = 'queued', updated_at = ?1 WHERE state = 'running'")
            .bind(unix_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Cancel every queued job of a user. Running jobs are left to the abort tokens.
    pub async fn cancel_queued_jobs_for_user(&self, user_id: i64) -> Result<u64> {
        let r = sqlx::query(
            "UPDATE jobs SET state = 'cancelled', updated_at = ?1 WHERE user_id = ?2 AND state = 'queued'",
        )
        .bind(unix_timestamp())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }
}
