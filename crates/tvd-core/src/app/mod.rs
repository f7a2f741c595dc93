//! Request lifecycle: chat commands, URL intake, callback buttons, and job
//! execution, wired over the store, the extractor, and the messenger.

mod callbacks;
mod commands;
mod intake;
mod runner;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::TvdConfig;
use crate::control::JobControl;
use crate::error::BotError;
use crate::extractor::Extractor;
use crate::gateway::{ChatId, Keyboard, MessageRef, Messenger};
use crate::platform_policy::PlatformPolicy;
use crate::queue::{JobQueue, JobRequest};
use crate::render;
use crate::retry::RetryPolicy;
use crate::session::{Session, SessionStore};
use crate::store::{JobId, Store};
use crate::worker::WorkerPool;

/// Subtitle languages used when the user confirms without ticking any.
pub const DEFAULT_SUBTITLE_LANGS: &[&str] = &["ar", "en"];

/// A text message from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub user_id: i64,
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub text: String,
}

/// A button press.
#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub id: String,
    pub user_id: i64,
    pub chat_id: ChatId,
    /// Message carrying the pressed keyboard; None when it is too old to edit.
    pub message: Option<MessageRef>,
    pub data: String,
}

pub struct App {
    cfg: Arc<TvdConfig>,
    store: Store,
    extractor: Arc<dyn Extractor>,
    messenger: Arc<dyn Messenger>,
    sessions: SessionStore,
    queue: JobQueue,
    control: Arc<JobControl>,
    download_dir: PathBuf,
    retry: RetryPolicy,
}

impl App {
    pub fn new(
        cfg: TvdConfig,
        store: Store,
        extractor: Arc<dyn Extractor>,
        messenger: Arc<dyn Messenger>,
        download_dir: PathBuf,
    ) -> Self {
        let queue = JobQueue::new(store.clone(), cfg.max_jobs_per_user);
        Self {
            sessions: SessionStore::new(cfg.session_ttl()),
            retry: cfg.retry_policy(),
            cfg: Arc::new(cfg),
            store,
            extractor,
            messenger,
            queue,
            control: Arc::new(JobControl::new()),
            download_dir,
        }
    }

    /// Worker pool sharing this app's queue signal and job control.
    pub fn worker_pool(&self, policy: Arc<tokio::sync::Mutex<PlatformPolicy>>) -> WorkerPool {
        WorkerPool::new(
            self.store.clone(),
            self.queue.notifier(),
            Arc::clone(&self.control),
            policy,
            self.cfg.max_concurrent_downloads,
            self.cfg.max_jobs_per_user,
        )
    }

    /// Drop expired menus; called periodically by the bot loop.
    pub fn purge_sessions(&self) -> usize {
        self.sessions.purge_expired(std::time::Instant::now())
    }

    /// Entry point for text messages: commands, otherwise a link to analyse.
    pub async fn handle_message(&self, msg: IncomingMessage) -> Result<()> {
        let text = msg.text.trim();
        if text.starts_with('/') {
            self.handle_command(&msg, text).await
        } else {
            self.handle_url(&msg, text).await
        }
    }

    async fn send(&self, chat: ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageRef> {
        self.messenger.send_text(chat, text, keyboard).await
    }

    /// Edit a message; failures (deleted message, unchanged text) are logged and ignored.
    async fn edit(&self, msg: MessageRef, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(e) = self.messenger.edit_text(msg, text, keyboard).await {
            tracing::debug!(chat_id = msg.chat_id, message_id = msg.message_id, "edit failed: {:#}", e);
        }
    }

    /// Tell the user why their request was refused, editing `msg` when there is one.
    async fn refuse(&self, chat: ChatId, msg: Option<MessageRef>, reason: BotError) -> Result<()> {
        tracing::debug!(chat_id = chat, "refused: {}", reason);
        let text = render::refusal(&reason, &self.cfg);
        match msg {
            Some(msg) => self.edit(msg, &text, None).await,
            None => {
                self.send(chat, &text, None).await?;
            }
        }
        Ok(())
    }

    /// Stop everything the user has going: running downloads, queued jobs, open menu.
    async fn cancel_all(&self, user_id: i64) -> Result<(usize, u64)> {
        let running = self.control.abort_user(user_id);
        let queued = self.store.cancel_queued_jobs_for_user(user_id).await?;
        self.sessions.clear(user_id);
        tracing::info!(user_id, running, queued, "user cancelled downloads");
        Ok((running, queued))
    }

    /// Queue a job for the session's URL and turn `msg` into its status message.
    async fn enqueue(
        &self,
        msg: MessageRef,
        user_id: i64,
        session: &Session,
        spec: crate::queue::JobSpec,
    ) -> Result<Option<JobId>> {
        // Shown before submitting so a fast worker's first progress edit is not overwritten.
        self.edit(msg, &render::queued(spec.label()), Some(&render::cancel_keyboard()))
            .await;
        let req = JobRequest {
            user_id,
            chat_id: msg.chat_id,
            message_id: Some(msg.message_id),
            url: session.url.clone(),
            platform: session.platform.label().to_string(),
            title: Some(session.info.title.clone()),
            spec,
        };
        match self.queue.submit(req).await {
            Ok(id) => Ok(Some(id)),
            Err(e) => match e.downcast::<BotError>() {
                Ok(refused) => {
                    self.refuse(msg.chat_id, Some(msg), refused).await?;
                    Ok(None)
                }
                Err(e) => Err(e),
            },
        }
    }
}
