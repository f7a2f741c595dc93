//! Inline-button presses.

use anyhow::Result;

use super::{App, IncomingCallback, DEFAULT_SUBTITLE_LANGS};
use crate::action::{Action, AdminView};
use crate::error::BotError;
use crate::gateway::MessageRef;
use crate::queue::JobSpec;
use crate::render;
use crate::session::{Session, SessionKind};
use crate::store::unix_timestamp;

/// How many rows the admin failure and user lists show.
const ADMIN_LIST_LIMIT: i64 = 10;

impl App {
    pub async fn handle_callback(&self, cb: IncomingCallback) -> Result<()> {
        if let Err(e) = self.messenger.answer_callback(&cb.id, None).await {
            tracing::debug!("answer callback failed: {:#}", e);
        }
        let Some(action) = Action::parse(&cb.data) else {
            tracing::debug!(user_id = cb.user_id, data = %cb.data, "ignoring unknown callback");
            return Ok(());
        };
        let Some(msg) = cb.message else {
            return Ok(());
        };
        let user = cb.user_id;
        if self.store.is_banned(user).await? {
            return self.refuse(cb.chat_id, Some(msg), BotError::Banned).await;
        }

        match action {
            Action::Help => {
                self.edit(msg, &render::help(&self.cfg), Some(&render::back_keyboard()))
                    .await
            }
            Action::Features => {
                self.edit(msg, &render::features(&self.cfg), Some(&render::back_keyboard()))
                    .await
            }
            Action::Stats => {
                let text = self.stats_text_for(user).await?;
                self.edit(msg, &text, Some(&render::back_keyboard())).await
            }
            Action::Settings => {
                let settings = self.store.user_settings(user).await?;
                let (text, kb) = render::settings_menu(&settings);
                self.edit(msg, &text, Some(&kb)).await
            }
            Action::SetQuality(height) => {
                let mut settings = self.store.user_settings(user).await?;
                settings.preferred_height = height;
                self.store.set_user_settings(user, &settings).await?;
                let (text, kb) = render::settings_menu(&settings);
                self.edit(msg, &text, Some(&kb)).await
            }
            Action::BackMain => {
                self.edit(msg, &render::welcome(None), Some(&render::main_menu()))
                    .await
            }
            Action::Cancel => {
                let (running, queued) = self.cancel_all(user).await?;
                self.edit(msg, &render::cancelled(running, queued), None).await
            }
            Action::Admin(view) => self.admin_view(msg, user, view).await?,
            keyed => {
                let session = keyed
                    .url_key()
                    .and_then(|k| self.session_for(user, k))
                    .filter(|s| s.kind == expected_kind(&keyed));
                let Some(session) = session else {
                    return self.refuse(cb.chat_id, Some(msg), BotError::SessionExpired).await;
                };
                self.keyed_action(msg, user, &session, keyed).await?;
            }
        }
        Ok(())
    }

    /// Live session whose URL matches the pressed button.
    fn session_for(&self, user_id: i64, key: &str) -> Option<Session> {
        self.sessions.get(user_id).filter(|s| s.url_key == key)
    }

    async fn keyed_action(
        &self,
        msg: MessageRef,
        user: i64,
        session: &Session,
        action: Action,
    ) -> Result<()> {
        match action {
            Action::Video { key } => {
                let (text, kb) = if session.formats.is_empty() {
                    render::no_formats(&key)
                } else {
                    render::quality_menu(&session.info.title, &session.formats, &key)
                };
                self.edit(msg, &text, Some(&kb)).await;
            }
            Action::Format { format_id, .. } => {
                self.enqueue(
                    msg,
                    user,
                    session,
                    JobSpec::Video {
                        format_id: Some(format_id),
                    },
                )
                .await?;
            }
            Action::Audio { .. } => {
                self.enqueue(msg, user, session, JobSpec::Audio).await?;
            }
            Action::Subs { key } => {
                let (text, kb) = render::subtitle_menu(&session.selected_langs, &key);
                self.edit(msg, &text, Some(&kb)).await;
            }
            Action::ToggleLang { key, lang } => match self.sessions.toggle_lang(user, &lang) {
                Some(selected) => {
                    let (text, kb) = render::subtitle_menu(&selected, &key);
                    self.edit(msg, &text, Some(&kb)).await;
                }
                None => {
                    self.refuse(msg.chat_id, Some(msg), BotError::SessionExpired)
                        .await?
                }
            },
            Action::SubsConfirm { .. } => {
                let langs = if session.selected_langs.is_empty() {
                    DEFAULT_SUBTITLE_LANGS.iter().map(|l| l.to_string()).collect()
                } else {
                    session.selected_langs.clone()
                };
                self.enqueue(msg, user, session, JobSpec::Subtitles { langs })
                    .await?;
            }
            Action::BackOptions { key } => {
                let (text, kb) =
                    render::video_options(&session.info, &session.platform, &session.host, &key);
                self.edit(msg, &text, Some(&kb)).await;
            }
            Action::All { .. } => {
                let spec = JobSpec::All {
                    format_id: None,
                    langs: self.cfg.subtitle_languages.clone(),
                };
                self.enqueue(msg, user, session, spec).await?;
            }
            Action::Playlist { key, count } => {
                let count = count.min(self.cfg.playlist_max_videos);
                let (text, kb) = render::playlist_confirm(&session.info.title, count, &key);
                self.edit(msg, &text, Some(&kb)).await;
            }
            Action::PlaylistConfirm { count, .. } => {
                let spec = JobSpec::Playlist {
                    max_videos: count.min(self.cfg.playlist_max_videos),
                };
                self.enqueue(msg, user, session, spec).await?;
                self.sessions.clear(user);
            }
            other => tracing::debug!(?other, "action without session handling"),
        }
        Ok(())
    }

    async fn admin_view(&self, msg: MessageRef, user: i64, view: AdminView) -> Result<()> {
        if !self.cfg.is_admin(user) {
            self.edit(msg, &render::not_admin(), None).await;
            return Ok(());
        }
        let text = match view {
            AdminView::Stats => render::admin_detailed(&self.store.global_stats(unix_timestamp()).await?),
            AdminView::Failures => {
                render::admin_failures(&self.store.recent_failures(ADMIN_LIST_LIMIT).await?)
            }
            AdminView::Users => render::admin_users(&self.store.list_users(ADMIN_LIST_LIMIT).await?),
        };
        self.edit(msg, &text, Some(&render::back_keyboard())).await;
        Ok(())
    }
}

/// Session kind a keyed action belongs to.
fn expected_kind(action: &Action) -> SessionKind {
    match action {
        Action::Playlist { .. } | Action::PlaylistConfirm { .. } => SessionKind::Playlist,
        _ => SessionKind::Single,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_actions_need_a_playlist_session() {
        let key = || "k".to_string();
        assert_eq!(
            expected_kind(&Action::PlaylistConfirm { key: key(), count: 5 }),
            SessionKind::Playlist
        );
        assert_eq!(expected_kind(&Action::SubsConfirm { key: key() }), SessionKind::Single);
        assert_eq!(
            expected_kind(&Action::ToggleLang {
                key: key(),
                lang: "ar".into()
            }),
            SessionKind::Single
        );
    }
}
