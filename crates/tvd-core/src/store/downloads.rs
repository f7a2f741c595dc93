//! Download log and the statistics derived from it.

use anyhow::Result;
use sqlx::Row;

use super::db::{unix_timestamp, Store};
use super::types::{DownloadRecord, DownloadStatus, FailureRecord, GlobalStats, UserStats};

const DAY_SECS: i64 = 24 * 3600;

impl Store {
    /// Record an attempt now. Completed attempts bump the user's download counter.
    pub async fn log_download(&self, record: &DownloadRecord) -> Result<i64> {
        self.log_download_at(record, unix_timestamp()).await
    }

    pub async fn log_download_at(&self, record: &DownloadRecord, created_at: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            r#"
            INSERT INTO downloads (
                user_id, url, title, platform, file_size, sha256,
                created_at, status, error_msg
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.url)
        .bind(&record.title)
        .bind(&record.platform)
        .bind(record.file_size)
        .bind(&record.sha256)
        .bind(created_at)
        .bind(record.status.as_str())
        .bind(&record.error_msg)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        if record.status == DownloadStatus::Completed {
            sqlx::query("UPDATE users SET downloads_count = downloads_count + 1 WHERE user_id = ?1")
                .bind(record.user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(id)
    }

    /// Statistics for one user, or None if the user never registered.
    pub async fn user_stats(&self, user_id: i64) -> Result<Option<UserStats>> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS attempts,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN file_size ELSE 0 END), 0) AS bytes
            FROM downloads
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        let total_attempts: i64 = row.get("attempts");
        let completed: i64 = row.get("completed");
        let success_rate = if total_attempts > 0 {
            completed as f64 / total_attempts as f64 * 100.0
        } else {
            0.0
        };
        Ok(Some(UserStats {
            downloads_count: user.downloads_count,
            joined_at: user.joined_at,
            total_attempts,
            completed,
            success_rate,
            total_bytes: row.get("bytes"),
        }))
    }

    /// Totals for the admin panel; "last 24 hours" is relative to `now`.
    pub async fn global_stats(&self, now: i64) -> Result<GlobalStats> {
        let since = now - DAY_SECS;
        let users = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN is_banned != 0 THEN 1 ELSE 0 END), 0) AS banned
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let downloads = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN created_at > ?1 THEN 1 ELSE 0 END), 0) AS recent,
                COALESCE(SUM(CASE WHEN created_at > ?2 AND status = 'completed' THEN 1 ELSE 0 END), 0)
                    AS recent_completed
            FROM downloads
            "#,
        )
        .bind(since)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        let platforms = sqlx::query(
            r#"
            SELECT platform, COUNT(*) AS n
            FROM downloads
            GROUP BY platform
            ORDER BY n DESC, platform ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(GlobalStats {
            total_users: users.get("total"),
            banned_users: users.get("banned"),
            total_downloads: downloads.get("total"),
            downloads_24h: downloads.get("recent"),
            completed_24h: downloads.get("recent_completed"),
            per_platform: platforms
                .iter()
                .map(|r| (r.get::<String, _>("platform"), r.get::<i64, _>("n")))
                .collect(),
        })
    }

    /// Newest failed attempts first.
    pub async fn recent_failures(&self, limit: i64) -> Result<Vec<FailureRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, url, platform, error_msg, created_at
            FROM downloads
            WHERE status = 'failed'
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| FailureRecord {
                user_id: r.get("user_id"),
                url: r.get("url"),
                platform: r.get("platform"),
                error_msg: r.get("error_msg"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
