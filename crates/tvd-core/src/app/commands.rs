//! Slash commands.

use anyhow::Result;

use super::{App, IncomingMessage};
use crate::error::BotError;
use crate::render;
use crate::store::unix_timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Command {
    Start,
    Help,
    Stats,
    Settings,
    Cancel,
    Admin,
    Ban(Option<i64>),
    Unban(Option<i64>),
    Unknown,
}

impl Command {
    /// Parse `/name[@bot] [args]`.
    pub(super) fn parse(text: &str) -> Option<Command> {
        let rest = text.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        let arg = parts.next().and_then(|a| a.parse::<i64>().ok());
        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "stats" => Command::Stats,
            "settings" => Command::Settings,
            "cancel" => Command::Cancel,
            "admin" => Command::Admin,
            "ban" => Command::Ban(arg),
            "unban" => Command::Unban(arg),
            _ => Command::Unknown,
        })
    }

    fn admin_only(&self) -> bool {
        matches!(self, Command::Admin | Command::Ban(_) | Command::Unban(_))
    }
}

impl App {
    pub(super) async fn handle_command(&self, msg: &IncomingMessage, text: &str) -> Result<()> {
        let Some(cmd) = Command::parse(text) else {
            return Ok(());
        };
        let chat = msg.chat_id;
        let user = msg.user_id;

        if cmd.admin_only() && !self.cfg.is_admin(user) {
            self.send(chat, &render::not_admin(), None).await?;
            return Ok(());
        }
        if !cmd.admin_only() && cmd != Command::Start && self.store.is_banned(user).await? {
            return self.refuse(chat, None, BotError::Banned).await;
        }

        match cmd {
            Command::Start => {
                let created = self
                    .store
                    .add_user(user, msg.username.as_deref(), msg.first_name.as_deref())
                    .await?;
                if created {
                    tracing::info!(user_id = user, "new user registered");
                }
                if self.store.is_banned(user).await? {
                    self.refuse(chat, None, BotError::Banned).await?;
                } else {
                    self.send(
                        chat,
                        &render::welcome(msg.first_name.as_deref()),
                        Some(&render::main_menu()),
                    )
                    .await?;
                }
            }
            Command::Help => {
                self.send(chat, &render::help(&self.cfg), Some(&render::main_menu()))
                    .await?;
            }
            Command::Stats => {
                let text = self.stats_text(user, msg).await?;
                self.send(chat, &text, None).await?;
            }
            Command::Settings => {
                let settings = self.store.user_settings(user).await?;
                let (text, kb) = render::settings_menu(&settings);
                self.send(chat, &text, Some(&kb)).await?;
            }
            Command::Cancel => {
                let (running, queued) = self.cancel_all(user).await?;
                self.send(chat, &render::cancelled(running, queued), None).await?;
            }
            Command::Admin => {
                let stats = self.store.global_stats(unix_timestamp()).await?;
                let (text, kb) = render::admin_panel(&stats, &self.cfg);
                self.send(chat, &text, Some(&kb)).await?;
            }
            Command::Ban(target) | Command::Unban(target) => {
                let banning = matches!(cmd, Command::Ban(_));
                let Some(target) = target else {
                    let usage = if banning { "/ban <user_id>" } else { "/unban <user_id>" };
                    self.send(chat, &render::usage(usage), None).await?;
                    return Ok(());
                };
                self.store.set_banned(target, banning).await?;
                if banning {
                    self.cancel_all(target).await?;
                }
                tracing::info!(admin_id = user, user_id = target, banned = banning, "ban flag changed");
                self.send(chat, &render::ban_result(target, banning), None).await?;
            }
            Command::Unknown => {
                self.send(chat, "Unknown command. Try /help.", None).await?;
            }
        }
        Ok(())
    }

    /// Stats text for a user, registering them first if needed.
    pub(super) async fn stats_text(&self, user_id: i64, msg: &IncomingMessage) -> Result<String> {
        self.store
            .add_user(user_id, msg.username.as_deref(), msg.first_name.as_deref())
            .await?;
        self.stats_text_for(user_id).await
    }

    pub(super) async fn stats_text_for(&self, user_id: i64) -> Result<String> {
        let user = self.store.get_user(user_id).await?;
        let stats = self.store.user_stats(user_id).await?;
        Ok(match (user, stats) {
            (Some(user), Some(stats)) => render::user_stats(&user, &stats),
            _ => "No statistics yet. Send a link to get started!".to_string(),
        })
    }
}
