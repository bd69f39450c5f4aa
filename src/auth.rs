//! Admin and channel enablement checks.

use teloxide::types::{ChatId, UserId};

use crate::store::BotConfig;

/// What kind of destination a command or post arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// One-to-many destination where only admins publish (a Telegram channel).
    Broadcast,
    Group,
    Private,
}

impl Destination {
    /// Only broadcast destinations can be switched on for automatic rewriting.
    pub fn can_be_enabled(self) -> bool {
        matches!(self, Destination::Broadcast)
    }
}

pub fn is_admin(config: &BotConfig, user_id: UserId) -> bool {
    config.admin_users.contains(&user_id)
}

pub fn is_channel_enabled(config: &BotConfig, chat_id: ChatId) -> bool {
    config.enabled_channels.contains(&chat_id)
}
