//! Fixed-window rate limiting: one counter per user per clock hour.

use anyhow::Result;
use sqlx::Row;

use super::db::Store;

impl Store {
    /// Count one request for `user_id` at unix time `now` and report whether it is allowed.
    ///
    /// The window is the clock hour `now / 3600`. A new window restarts the
    /// count at one; within a window, requests past `limit` are refused (and
    /// still counted).
    pub async fn check_rate_limit(&self, user_id: i64, limit: u32, now: i64) -> Result<bool> {
        let hour = now / 3600;
        // Single upsert; concurrent callers serialize on the write lock.
        let row = sqlx::query(
            r#"
            INSERT INTO rate_limits (user_id, hour_start, requests_count) VALUES (?1, ?2, 1)
            ON CONFLICT (user_id) DO UPDATE SET
                requests_count = CASE
                    WHEN rate_limits.hour_start = excluded.hour_start THEN rate_limits.requests_count + 1
                    ELSE 1
                END,
                hour_start = excluded.hour_start
            RETURNING requests_count
            "#,
        )
        .bind(user_id)
        .bind(hour)
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.get("requests_count");

        // The first request of a window always passes.
        let allowed = count == 1 || count <= i64::from(limit);
        if !allowed {
            tracing::debug!(user_id, limit, count, "rate limit reached");
        }
        Ok(allowed)
    }
}
