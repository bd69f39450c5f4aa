//! Channel post processing: gate, rewrite, conditional edit.

use std::collections::HashSet;

use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth;
use crate::rewriter::{CaptionRewriter, TextGenerator};
use crate::store::BotConfig;
use crate::telegram::{ReplyFormat, Transport};

/// Telegram rejects captions longer than this many characters.
pub const CAPTION_LIMIT: usize = 1024;

const LEDGER_CAPACITY: usize = 4096;

/// A new or edited post as seen by the handler.
#[derive(Debug, Clone)]
pub struct IncomingPost {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub caption: Option<String>,
    pub chat_title: Option<String>,
    /// Whether this arrived as an edit of an existing post.
    pub edited: bool,
}

impl IncomingPost {
    /// Title for logs, falling back to the numeric id.
    pub fn display_name(&self) -> String {
        self.chat_title.clone().unwrap_or_else(|| self.chat_id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionEdit {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub caption: String,
    /// Generated captions may carry HTML markup.
    pub format: ReplyFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// The edit event was caused by our own caption edit.
    OwnEdit,
    Disabled,
    NoCaption,
    Unchanged,
    TooLong,
    Edited,
    EditFailed,
}

/// Messages whose caption we edited and whose edit echo has not arrived yet.
/// Telegram reports the bot's own edits as edited posts; without this the
/// rewritten caption would be rewritten again.
#[derive(Default)]
pub struct EditLedger {
    pending: Mutex<HashSet<(ChatId, MessageId)>>,
}

impl EditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, chat_id: ChatId, message_id: MessageId) {
        let mut pending = self.pending.lock().await;
        // Echoes that never arrive would otherwise accumulate forever
        if pending.len() >= LEDGER_CAPACITY {
            pending.clear();
        }
        pending.insert((chat_id, message_id));
    }

    /// Consume the entry for this message. True if it was ours.
    pub async fn take(&self, chat_id: ChatId, message_id: MessageId) -> bool {
        self.pending.lock().await.remove(&(chat_id, message_id))
    }
}

/// Which caption, if any, should be sent for rewriting.
pub fn plan<'a>(post: &'a IncomingPost, config: &BotConfig) -> Result<&'a str, PostOutcome> {
    if !auth::is_channel_enabled(config, post.chat_id) {
        return Err(PostOutcome::Disabled);
    }
    match post.caption.as_deref() {
        Some(caption) if !caption.is_empty() => Ok(caption),
        _ => Err(PostOutcome::NoCaption),
    }
}

/// The edit to issue for a rewritten caption, if any.
pub fn caption_edit(post: &IncomingPost, original: &str, rewritten: String) -> Result<CaptionEdit, PostOutcome> {
    if rewritten == original {
        return Err(PostOutcome::Unchanged);
    }
    if rewritten.chars().count() > CAPTION_LIMIT {
        return Err(PostOutcome::TooLong);
    }
    Ok(CaptionEdit {
        chat_id: post.chat_id,
        message_id: post.message_id,
        caption: rewritten,
        format: ReplyFormat::Html,
    })
}

/// Run one post through the pipeline. Never fails; every problem is logged
/// and turned into a [`PostOutcome`].
pub async fn handle_post<G, T>(
    post: &IncomingPost,
    config: &BotConfig,
    rewriter: &CaptionRewriter<G>,
    transport: &T,
    ledger: &EditLedger,
) -> PostOutcome
where
    G: TextGenerator,
    T: Transport + ?Sized,
{
    if post.edited && ledger.take(post.chat_id, post.message_id).await {
        return PostOutcome::OwnEdit;
    }

    let original = match plan(post, config) {
        Ok(caption) => caption,
        Err(outcome) => {
            match outcome {
                PostOutcome::Disabled => info!("🔇 Bot disabled for channel: {}", post.display_name()),
                _ => info!("ℹ️ No caption found, skipping message"),
            }
            return outcome;
        }
    };

    info!("📝 Processing post in channel: {}", post.display_name());

    let rewritten = rewriter.rewrite(original).await;
    let edit = match caption_edit(post, original, rewritten) {
        Ok(edit) => edit,
        Err(outcome) => {
            match outcome {
                PostOutcome::TooLong => warn!("Improved caption exceeds {CAPTION_LIMIT} chars, keeping original"),
                _ => info!("ℹ️ Caption unchanged"),
            }
            return outcome;
        }
    };

    match transport
        .edit_caption(edit.chat_id, edit.message_id, &edit.caption, edit.format)
        .await {
        Ok(()) => {
            ledger.record(edit.chat_id, edit.message_id).await;
            info!("✅ Caption updated successfully");
            PostOutcome::Edited
        }
        Err(e) => {
            warn!("❌ Error processing channel post: {e}");
            PostOutcome::EditFailed
        }
    }
}
