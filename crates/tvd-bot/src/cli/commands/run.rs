//! `tvd run` – run the Telegram bot and the download worker pool.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tokio::sync::watch;
use tvd_core::app::App;
use tvd_core::config::TvdConfig;
use tvd_core::extractor::YtDlp;
use tvd_core::platform_policy::PlatformPolicy;
use tvd_core::store::Store;
use tvd_core::worker::JobRunner;

use crate::telegram::{self, TelegramMessenger};

/// How often expired option menus are dropped.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run_bot(mut cfg: TvdConfig, workers: Option<usize>) -> Result<()> {
    if let Some(n) = workers {
        cfg.max_concurrent_downloads = n.max(1);
    }
    let token = cfg.require_token()?.to_string();
    let store = Store::open_at(cfg.resolved_database_path()?).await?;
    let download_dir = cfg.resolved_download_dir()?;
    tokio::fs::create_dir_all(&download_dir)
        .await
        .with_context(|| format!("create download dir: {}", download_dir.display()))?;

    let policy_path = PlatformPolicy::default_path().ok();
    let policy = match &policy_path {
        Some(path) => PlatformPolicy::load_or_new(path, 1, cfg.max_concurrent_downloads),
        None => PlatformPolicy::new(1, cfg.max_concurrent_downloads),
    };
    let policy = Arc::new(tokio::sync::Mutex::new(policy));

    let bot = Bot::new(token);
    if let Err(e) = telegram::register_commands(&bot).await {
        tracing::warn!("could not register bot commands: {:#}", e);
    }

    let extractor = Arc::new(YtDlp::new(cfg.ytdlp_path.clone()));
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    tracing::info!(
        workers = cfg.max_concurrent_downloads,
        download_dir = %download_dir.display(),
        "starting bot"
    );
    let app = Arc::new(App::new(cfg, store, extractor, messenger, download_dir));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = app.worker_pool(Arc::clone(&policy));
    let runner: Arc<dyn JobRunner> = app.clone();
    let worker_handle = tokio::spawn(async move { pool.run(runner, shutdown_rx).await });

    let purge_app = Arc::clone(&app);
    let purge_handle = tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            tick.tick().await;
            let purged = purge_app.purge_sessions();
            if purged > 0 {
                tracing::debug!(purged, "expired sessions dropped");
            }
        }
    });

    // Returns once ctrl-c stops the dispatcher.
    telegram::dispatch(bot, Arc::clone(&app)).await;

    tracing::info!("shutting down; waiting for running downloads");
    purge_handle.abort();
    let _ = shutdown_tx.send(true);
    let ran = worker_handle.await.context("worker pool task")?;

    if let Some(path) = policy_path {
        if let Err(e) = policy.lock().await.save_to_path(&path) {
            tracing::warn!("could not save platform policy to {}: {:#}", path.display(), e);
        }
    }
    tracing::info!("bot stopped after {} job(s)", ran);
    Ok(())
}
