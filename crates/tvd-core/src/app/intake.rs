//! Link intake: gatekeeping, probe, and the first options menu.

use anyhow::Result;
use std::time::Instant;

use super::{App, IncomingMessage};
use crate::error::BotError;
use crate::formats::available_formats;
use crate::platform::{self, ContentKind};
use crate::render;
use crate::retry::run_with_retry;
use crate::session::{Session, SessionKind};
use crate::store::{unix_timestamp, DownloadRecord};

impl App {
    pub(super) async fn handle_url(&self, msg: &IncomingMessage, text: &str) -> Result<()> {
        let user = msg.user_id;
        let chat = msg.chat_id;
        self.store
            .add_user(user, msg.username.as_deref(), msg.first_name.as_deref())
            .await?;

        if self.store.is_banned(user).await? {
            return self.refuse(chat, None, BotError::Banned).await;
        }

        if !self.cfg.is_admin(user)
            && !self
                .store
                .check_rate_limit(user, self.cfg.rate_limit_per_hour, unix_timestamp())
                .await?
        {
            tracing::info!(user_id = user, "rate limited");
            let limit = self.cfg.rate_limit_per_hour;
            return self.refuse(chat, None, BotError::RateLimited { limit }).await;
        }

        let target = match platform::classify(text, &self.cfg.supported_platforms) {
            Ok(t) => t,
            Err(e) => return self.refuse(chat, None, e).await,
        };

        let status = self.send(chat, &render::analyzing(), None).await?;
        let extractor = &self.extractor;
        let info = match run_with_retry(&self.retry, || extractor.probe(&target.url)).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(user_id = user, url = %target.url, "probe failed: {}", e);
                let record =
                    DownloadRecord::failed(user, &target.url, target.platform.label(), e.to_string());
                self.store.log_download(&record).await?;
                self.edit(status, &render::probe_failed(&e), None).await;
                return Ok(());
            }
        };

        let key = platform::url_key(&target.url);
        let playlist = info.has_multiple_entries()
            || (target.kind == ContentKind::Playlist && info.is_playlist);
        let settings = self.store.user_settings(user).await?;

        let (kind, formats, (text, keyboard)) = if playlist {
            if !self.cfg.enable_playlists {
                return self.refuse(chat, Some(status), BotError::PlaylistsDisabled).await;
            }
            let menu = render::playlist_options(&info, &key, self.cfg.playlist_max_videos);
            (SessionKind::Playlist, Vec::new(), menu)
        } else {
            let menu = render::video_options(&info, &target.platform, &target.host, &key);
            (SessionKind::Single, available_formats(&info), menu)
        };

        tracing::info!(
            user_id = user,
            platform = %target.platform,
            playlist,
            entries = info.entries.len(),
            "link analysed"
        );
        self.sessions.put(
            user,
            Session {
                url: target.url,
                url_key: key,
                platform: target.platform,
                host: target.host,
                info,
                formats,
                kind,
                selected_langs: settings.subtitle_langs,
                created_at: Instant::now(),
            },
        );
        self.edit(status, &text, Some(&keyboard)).await;
        Ok(())
    }
}
