//! Row types for the bot database.

use serde::{Deserialize, Serialize};

/// Job identifier.
pub type JobId = i64;

/// Job state stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "completed" => JobState::Completed,
            "cancelled" => JobState::Cancelled,
            _ => JobState::Failed,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobState::Queued | JobState::Running)
    }
}

/// Per-user preferences, stored as JSON on the user row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Cap on video height when no explicit format is chosen. None = config default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_height: Option<u32>,
    /// Languages preselected in the subtitle menu.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtitle_langs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub joined_at: i64,
    pub downloads_count: i64,
    pub is_premium: bool,
    pub is_banned: bool,
    pub settings: UserSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }
}

/// One attempt written to the download log.
#[derive(Debug, Clone)]
pub struct DownloadRecord {
    pub user_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub platform: String,
    pub file_size: Option<i64>,
    pub sha256: Option<String>,
    pub status: DownloadStatus,
    pub error_msg: Option<String>,
}

impl DownloadRecord {
    pub fn completed(user_id: i64, url: &str, platform: &str) -> Self {
        Self {
            user_id,
            url: url.to_string(),
            title: None,
            platform: platform.to_string(),
            file_size: None,
            sha256: None,
            status: DownloadStatus::Completed,
            error_msg: None,
        }
    }

    pub fn failed(user_id: i64, url: &str, platform: &str, error: impl Into<String>) -> Self {
        Self {
            status: DownloadStatus::Failed,
            error_msg: Some(error.into()),
            ..Self::completed(user_id, url, platform)
        }
    }
}

/// Per-user statistics for `/stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub downloads_count: i64,
    pub joined_at: i64,
    pub total_attempts: i64,
    pub completed: i64,
    /// Percent of attempts that completed (0 when there are none).
    pub success_rate: f64,
    pub total_bytes: i64,
}

/// Totals for the admin panel.
#[derive(Debug, Clone, Default)]
pub struct GlobalStats {
    pub total_users: i64,
    pub banned_users: i64,
    pub total_downloads: i64,
    pub downloads_24h: i64,
    pub completed_24h: i64,
    /// Attempts per platform, most used first.
    pub per_platform: Vec<(String, i64)>,
}

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub user_id: i64,
    pub url: String,
    pub platform: String,
    pub error_msg: Option<String>,
    pub created_at: i64,
}

/// Fields needed to enqueue a job. `spec_json` is opaque to the store.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: i64,
    pub chat_id: i64,
    /// Message to edit with progress; None lets the worker send a fresh one.
    pub message_id: Option<i32>,
    pub url: String,
    pub platform: String,
    pub title: Option<String>,
    pub spec_json: String,
}

/// Summary view used by the CLI `jobs` command.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: JobId,
    pub user_id: i64,
    pub url: String,
    pub platform: String,
    pub state: JobState,
    pub updated_at: i64,
}

/// Full job record used by the worker pool.
#[derive(Debug, Clone)]
pub struct JobDetails {
    pub id: JobId,
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: Option<i32>,
    pub url: String,
    pub platform: String,
    pub title: Option<String>,
    pub spec_json: String,
    pub state: JobState,
    pub error_msg: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
