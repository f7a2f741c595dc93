//! Job queue: persistent jobs in the store plus a wake-up signal for the
//! worker pool.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::BotError;
use crate::store::{JobId, NewJob, Store};

/// What a job should produce. Stored as JSON on the job row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSpec {
    /// Video; None picks the user's preferred or the default format.
    Video {
        #[serde(default)]
        format_id: Option<String>,
    },
    /// Best audio transcoded to MP3.
    Audio,
    Subtitles { langs: Vec<String> },
    /// Video followed by subtitles.
    All {
        #[serde(default)]
        format_id: Option<String>,
        langs: Vec<String>,
    },
    Playlist { max_videos: usize },
}

impl JobSpec {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize job spec")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).with_context(|| format!("parse job spec: {s}"))
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobSpec::Video { .. } => "video",
            JobSpec::Audio => "audio",
            JobSpec::Subtitles { .. } => "subtitles",
            JobSpec::All { .. } => "video+subtitles",
            JobSpec::Playlist { .. } => "playlist",
        }
    }
}

/// A job as submitted by the request lifecycle.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: Option<i32>,
    pub url: String,
    pub platform: String,
    pub title: Option<String>,
    pub spec: JobSpec,
}

#[derive(Clone)]
pub struct JobQueue {
    store: Store,
    notify: Arc<Notify>,
    max_active_per_user: i64,
}

impl JobQueue {
    /// `max_jobs_per_user` is the running limit; up to four times that may be pending.
    pub fn new(store: Store, max_jobs_per_user: usize) -> Self {
        Self {
            store,
            notify: Arc::new(Notify::new()),
            max_active_per_user: (max_jobs_per_user.max(1) * 4) as i64,
        }
    }

    /// Signal the worker pool waits on.
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    /// Persist a queued job and wake the workers.
    ///
    /// Fails with `BotError::QueueFull` when the user already has too many
    /// queued or running jobs.
    pub async fn submit(&self, req: JobRequest) -> Result<JobId> {
        let active = self.store.count_active_jobs_for_user(req.user_id).await?;
        if active >= self.max_active_per_user {
            return Err(BotError::QueueFull { active }.into());
        }
        let id = self
            .store
            .enqueue_job(&NewJob {
                user_id: req.user_id,
                chat_id: req.chat_id,
                message_id: req.message_id,
                url: req.url,
                platform: req.platform,
                title: req.title,
                spec_json: req.spec.to_json()?,
            })
            .await?;
        tracing::info!(job_id = id, user_id = req.user_id, kind = req.spec.label(), "job queued");
        self.notify.notify_one();
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobState;

    fn request(user_id: i64) -> JobRequest {
        JobRequest {
            user_id,
            chat_id: user_id,
            message_id: Some(9),
            url: "https://youtu.be/abc".into(),
            platform: "youtube".into(),
            title: Some("Clip".into()),
            spec: JobSpec::Audio,
        }
    }

    #[test]
    fn spec_json_is_tagged() {
        let spec = JobSpec::Subtitles {
            langs: vec!["ar".into(), "en".into()],
        };
        let json = spec.to_json().unwrap();
        assert_eq!(json, r#"{"kind":"subtitles","langs":["ar","en"]}"#);
        assert_eq!(JobSpec::from_json(&json).unwrap(), spec);
        assert_eq!(
            JobSpec::from_json(r#"{"kind":"video"}"#).unwrap(),
            JobSpec::Video { format_id: None }
        );
        assert!(JobSpec::from_json(r#"{"kind":"hologram"}"#).is_err());
    }

    #[tokio::test]
    async fn submit_persists_and_notifies() {
        let store = Store::open_memory().await.unwrap();
        let queue = JobQueue::new(store.clone(), 2);
        let notify = queue.notifier();
        let id = queue.submit(request(1)).await.unwrap();
        // notify_one stores a permit when nobody is waiting yet.
        tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified())
            .await
            .unwrap();
        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.message_id, Some(9));
        assert_eq!(JobSpec::from_json(&job.spec_json).unwrap(), JobSpec::Audio);
    }

    #[tokio::test]
    async fn submit_refuses_when_user_backlog_is_full() {
        let store = Store::open_memory().await.unwrap();
        let queue = JobQueue::new(store, 1);
        for _ in 0..4 {
            queue.submit(request(1)).await.unwrap();
        }
        let err = queue.submit(request(1)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BotError>(),
            Some(BotError::QueueFull { active: 4 })
        ));
        // Other users are unaffected.
        queue.submit(request(2)).await.unwrap();
    }
}
