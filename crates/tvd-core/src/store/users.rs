//! User registration, moderation flags, and settings.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, Store};
use super::types::{UserRecord, UserSettings};

fn parse_settings(raw: Option<String>) -> UserSettings {
    raw.as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| match serde_json::from_str(s) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("ignoring unreadable user settings: {}", e);
                None
            }
        })
        .unwrap_or_default()
}

fn user_from_row(row: &SqliteRow) -> UserRecord {
    UserRecord {
        user_id: row.get("user_id"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        joined_at: row.get("joined_at"),
        downloads_count: row.get("downloads_count"),
        is_premium: row.get::<i64, _>("is_premium") != 0,
        is_banned: row.get::<i64, _>("is_banned") != 0,
        settings: parse_settings(row.get("settings_json")),
    }
}

impl Store {
    /// Register a user if unknown. Returns true when a new row was created.
    pub async fn add_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<bool> {
        let r = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (user_id, username, first_name, joined_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(first_name)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, username, first_name, joined_at, downloads_count,
                   is_premium, is_banned, settings_json
            FROM users
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn is_banned(&self, user_id: i64) -> Result<bool> {
        let banned: Option<i64> = sqlx::query_scalar("SELECT is_banned FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(banned.unwrap_or(0) != 0)
    }

    /// Set or clear the ban flag. Unknown users are created so a ban can precede first contact.
    pub async fn set_banned(&self, user_id: i64, banned: bool) -> Result<()> {
        self.upsert_flag(user_id, "is_banned", banned).await
    }

    pub async fn set_premium(&self, user_id: i64, premium: bool) -> Result<()> {
        self.upsert_flag(user_id, "is_premium", premium).await
    }

    async fn upsert_flag(&self, user_id: i64, column: &'static str, value: bool) -> Result<()> {
        let sql = format!(
            "INSERT INTO users (user_id, joined_at, {column}) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET {column} = excluded.{column}"
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(unix_timestamp())
            .bind(value as i64)
            .execute(&self.pool)
            .await
            .with_context(|| format!("update {column} for user {user_id}"))?;
        Ok(())
    }

    /// Settings for a user; defaults when the user or the settings are missing.
    pub async fn user_settings(&self, user_id: i64) -> Result<UserSettings> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT settings_json FROM users WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(parse_settings(raw.flatten()))
    }

    pub async fn set_user_settings(&self, user_id: i64, settings: &UserSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        sqlx::query(
            r#"
            INSERT INTO users (user_id, joined_at, settings_json) VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET settings_json = excluded.settings_json
            "#,
        )
        .bind(user_id)
        .bind(unix_timestamp())
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most active users first.
    pub async fn list_users(&self, limit: i64) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, username, first_name, joined_at, downloads_count,
                   is_premium, is_banned, settings_json
            FROM users
            ORDER BY downloads_count DESC, joined_at ASC, user_id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(user_from_row).collect())
    }
}
