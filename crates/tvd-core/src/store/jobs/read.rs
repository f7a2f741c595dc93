//! Job read operations: list, get, counts.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::super::db::Store;
use super::super::types::{JobDetails, JobId, JobState, JobSummary};

pub(super) fn details_from_row(row: &SqliteRow) -> JobDetails {
    let state: String = row.get("state");
    JobDetails {
        id: row.get("id"),
        user_id: row.get("user_id"),
        chat_id: row.get("chat_id"),
        message_id: row.get("message_id"),
        url: row.get("url"),
        platform: row.get("platform"),
        title: row.get("title"),
        spec_json: row.get("spec_json"),
        state: JobState::from_str(&state),
        error_msg: row.get("error_msg"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl Store {
    /// Most recently updated jobs first.
    pub async fn list_jobs(&self, limit: i64) -> Result<Vec<JobSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, url, platform, state, updated_at
            FROM jobs
            ORDER BY updated_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let state: String = row.get("state");
            out.push(JobSummary {
                id: row.get("id"),
                user_id: row.get("user_id"),
                url: row.get("url"),
                platform: row.get("platform"),
                state: JobState::from_str(&state),
                updated_at: row.get("updated_at"),
            });
        }
        Ok(out)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<JobDetails>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, chat_id, message_id, url, platform, title,
                   spec_json, state, error_msg, created_at, updated_at
            FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(details_from_row))
    }

    /// Queued plus running jobs of one user.
    pub async fn count_active_jobs_for_user(&self, user_id: i64) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE user_id = ?1 AND state IN ('queued', 'running')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    /// Ids of a user's jobs currently in `state`.
    pub async fn job_ids_for_user(&self, user_id: i64, state: JobState) -> Result<Vec<JobId>> {
        let ids = sqlx::query_scalar("SELECT id FROM jobs WHERE user_id = ?1 AND state = ?2 ORDER BY id")
            .bind(user_id)
            .bind(state.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
