//! Messaging gateway: the seam between the bot logic and the chat platform.
//!
//! The Telegram implementation lives in the `tvd-bot` crate; tests use an
//! in-memory recorder.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::action::Action;

pub type ChatId = i64;

/// A sent message that can be edited or deleted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonKind {
    /// Callback data sent back when pressed.
    Callback(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub kind: ButtonKind,
}

impl Button {
    pub fn action(label: impl Into<String>, action: &Action) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Callback(action.encode()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Url(url.into()),
        }
    }
}

/// Inline keyboard: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All callback payloads, row-major. Handy for assertions.
    pub fn callbacks(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                ButtonKind::Callback(data) => Some(data.as_str()),
                ButtonKind::Url(_) => None,
            })
            .collect()
    }
}

/// Outbound chat operations. Texts are HTML.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef>;

    async fn edit_text(&self, msg: MessageRef, text: &str, keyboard: Option<&Keyboard>) -> Result<()>;

    async fn delete(&self, msg: MessageRef) -> Result<()>;

    async fn send_document(&self, chat: ChatId, path: &Path, caption: Option<&str>) -> Result<()>;

    /// Acknowledge a button press, optionally with a short toast.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
