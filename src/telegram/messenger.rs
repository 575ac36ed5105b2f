//! Outbound chat operations behind a trait, so the request flow can be
//! driven without a live Bot API.

use std::path::Path;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, ReplyParameters};

use crate::core::error::AppError;
use crate::telegram::Bot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// Inline button carrying a selection token as callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub data: String,
}

impl KeyboardButton {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Audio,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<MessageRef, AppError>;

    async fn send_reply_text(&self, chat: ChatRef, reply_to: MessageRef, text: &str) -> Result<MessageRef, AppError>;

    async fn edit_text(&self, chat: ChatRef, message: MessageRef, text: &str) -> Result<(), AppError>;

    async fn send_keyboard(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        text: &str,
        rows: Vec<Vec<KeyboardButton>>,
    ) -> Result<MessageRef, AppError>;

    /// Uploads a local file as a video or audio message
    async fn send_file(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        kind: FileKind,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, AppError>;
}

/// `Messenger` backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn reply_params(message: MessageRef) -> ReplyParameters {
    ReplyParameters::new(MessageId(message.0)).allow_sending_without_reply()
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<MessageRef, AppError> {
        let msg = self.bot.send_message(ChatId(chat.0), text).await?;
        Ok(MessageRef(msg.id.0))
    }

    async fn send_reply_text(&self, chat: ChatRef, reply_to: MessageRef, text: &str) -> Result<MessageRef, AppError> {
        let msg = self
            .bot
            .send_message(ChatId(chat.0), text)
            .reply_parameters(reply_params(reply_to))
            .await?;
        Ok(MessageRef(msg.id.0))
    }

    async fn edit_text(&self, chat: ChatRef, message: MessageRef, text: &str) -> Result<(), AppError> {
        self.bot
            .edit_message_text(ChatId(chat.0), MessageId(message.0), text)
            .await?;
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        text: &str,
        rows: Vec<Vec<KeyboardButton>>,
    ) -> Result<MessageRef, AppError> {
        let keyboard = InlineKeyboardMarkup::new(rows.into_iter().map(|row| {
            row.into_iter()
                .map(|button| InlineKeyboardButton::callback(button.label, button.data))
                .collect::<Vec<_>>()
        }));

        let mut request = self.bot.send_message(ChatId(chat.0), text).reply_markup(keyboard);
        if let Some(reply_to) = reply_to {
            request = request.reply_parameters(reply_params(reply_to));
        }
        let msg = request.await?;
        Ok(MessageRef(msg.id.0))
    }

    async fn send_file(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        kind: FileKind,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, AppError> {
        let file = InputFile::file(path);
        let msg = match kind {
            FileKind::Video => {
                let mut request = self
                    .bot
                    .send_video(ChatId(chat.0), file)
                    .caption(caption)
                    .supports_streaming(true);
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_params(reply_to));
                }
                request.await?
            }
            FileKind::Audio => {
                let mut request = self.bot.send_audio(ChatId(chat.0), file).caption(caption);
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_params(reply_to));
                }
                request.await?
            }
        };
        Ok(MessageRef(msg.id.0))
    }
}
