//! Outbound Telegram calls and conversion of inbound messages.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{Chat, MessageId, ParseMode};
use tracing::{info, warn};

use crate::auth::Destination;
use crate::post::IncomingPost;

/// How outgoing text should be parsed by Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    Plain,
    MarkdownV2,
    Html,
}

impl ReplyFormat {
    fn parse_mode(self) -> Option<ParseMode> {
        match self {
            ReplyFormat::Plain => None,
            ReplyFormat::MarkdownV2 => Some(ParseMode::MarkdownV2),
            ReplyFormat::Html => Some(ParseMode::Html),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

/// The outbound calls the handlers make.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn edit_caption(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        caption: &str,
        format: ReplyFormat,
    ) -> Result<(), TransportError>;

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: ReplyFormat,
    ) -> Result<(), TransportError>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn edit_caption(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        caption: &str,
        format: ReplyFormat,
    ) -> Result<(), TransportError> {
        info!("✏️ Editing caption of msg {} in chat {}", message_id.0, chat_id);

        let mut request = self.bot.edit_message_caption(chat_id, message_id).caption(caption);
        if let Some(mode) = format.parse_mode() {
            request = request.parse_mode(mode);
        }

        request
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to edit caption: {e}");
                warn!("{}", msg);
                TransportError(msg)
            })
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: ReplyFormat,
    ) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(chat_id, text);
        if let Some(mode) = format.parse_mode() {
            request = request.parse_mode(mode);
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            TransportError(msg)
        })
    }
}

pub fn destination_of(chat: &Chat) -> Destination {
    if chat.is_channel() {
        Destination::Broadcast
    } else if chat.is_private() {
        Destination::Private
    } else {
        Destination::Group
    }
}

pub fn incoming_post(msg: &Message, edited: bool) -> IncomingPost {
    IncomingPost {
        chat_id: msg.chat.id,
        message_id: msg.id,
        caption: msg.caption().map(str::to_string),
        chat_title: msg.chat.title().map(str::to_string),
        edited,
    }
}
