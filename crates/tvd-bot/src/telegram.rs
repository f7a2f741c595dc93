//! Telegram side of the bot: `Messenger` over the Bot API and the update
//! dispatcher that feeds messages and button presses into the app.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::payloads::{
    AnswerCallbackQuerySetters, EditMessageTextSetters, SendDocumentSetters, SendMessageSetters,
};
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MaybeInaccessibleMessage,
    MessageId, ParseMode, User,
};
use teloxide::{ApiError, RequestError};

use tvd_core::app::{App, IncomingCallback, IncomingMessage};
use tvd_core::gateway::{ButtonKind, ChatId as TvdChatId, Keyboard, MessageRef, Messenger};

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard.rows.iter().map(|row| {
        row.iter()
            .filter_map(|b| match &b.kind {
                ButtonKind::Callback(data) => {
                    Some(InlineKeyboardButton::callback(b.label.clone(), data.clone()))
                }
                ButtonKind::Url(link) => match link.parse::<url::Url>() {
                    Ok(u) => Some(InlineKeyboardButton::url(b.label.clone(), u)),
                    Err(e) => {
                        tracing::debug!(%link, "dropping button with bad url: {}", e);
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat: TvdChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef> {
        let mut req = self
            .bot
            .send_message(ChatId(chat), text)
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard {
            req = req.reply_markup(markup(kb));
        }
        let msg = req.await.context("send message")?;
        Ok(MessageRef {
            chat_id: chat,
            message_id: msg.id.0,
        })
    }

    async fn edit_text(&self, msg: MessageRef, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        let mut req = self
            .bot
            .edit_message_text(ChatId(msg.chat_id), MessageId(msg.message_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard {
            req = req.reply_markup(markup(kb));
        }
        match req.await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e).context("edit message"),
        }
    }

    async fn delete(&self, msg: MessageRef) -> Result<()> {
        self.bot
            .delete_message(ChatId(msg.chat_id), MessageId(msg.message_id))
            .await
            .context("delete message")?;
        Ok(())
    }

    async fn send_document(&self, chat: TvdChatId, path: &Path, caption: Option<&str>) -> Result<()> {
        let mut req = self.bot.send_document(ChatId(chat), InputFile::file(path));
        if let Some(caption) = caption {
            req = req.caption(caption).parse_mode(ParseMode::Html);
        }
        req.await
            .with_context(|| format!("send document {}", path.display()))?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut req = self.bot.answer_callback_query(callback_id);
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await.context("answer callback")?;
        Ok(())
    }
}

/// Command list shown in the Telegram client menu.
pub async fn register_commands(bot: &Bot) -> Result<()> {
    let commands = vec![
        BotCommand::new("start", "Start the bot"),
        BotCommand::new("help", "How to use the bot"),
        BotCommand::new("stats", "Your download statistics"),
        BotCommand::new("settings", "Preferred video quality"),
        BotCommand::new("cancel", "Cancel your downloads"),
    ];
    bot.set_my_commands(commands).await?;
    Ok(())
}

fn user_id(user: &User) -> i64 {
    user.id.0 as i64
}

async fn on_message(msg: Message, app: Arc<App>) -> Result<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let incoming = IncomingMessage {
        user_id: user_id(user),
        chat_id: msg.chat.id.0,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        text: text.to_string(),
    };
    if let Err(e) = app.handle_message(incoming).await {
        tracing::error!(chat_id = msg.chat.id.0, "message handling failed: {:#}", e);
    }
    Ok(())
}

async fn on_callback(q: CallbackQuery, app: Arc<App>) -> Result<()> {
    let message = match &q.message {
        Some(MaybeInaccessibleMessage::Regular(m)) => Some(MessageRef {
            chat_id: m.chat.id.0,
            message_id: m.id.0,
        }),
        _ => None,
    };
    let incoming = IncomingCallback {
        id: q.id.clone(),
        user_id: user_id(&q.from),
        chat_id: message.map(|m| m.chat_id).unwrap_or_else(|| user_id(&q.from)),
        message,
        data: q.data.clone().unwrap_or_default(),
    };
    if let Err(e) = app.handle_callback(incoming).await {
        tracing::error!(user_id = user_id(&q.from), "callback handling failed: {:#}", e);
    }
    Ok(())
}

/// Long-poll updates until ctrl-c.
pub async fn dispatch(bot: Bot, app: Arc<App>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
