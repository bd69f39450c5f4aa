//! Admin commands: `/enable`, `/disable`, `/status`, `/help`.

use teloxide::types::{ChatId, UserId};
use teloxide::utils::command::BotCommands;
use teloxide::utils::markdown;
use tracing::{info, warn};

use crate::auth::{self, Destination};
use crate::store::{BotConfig, ConfigChange, ConfigStore};
use crate::telegram::{ReplyFormat, Transport};

pub const NOT_AUTHORIZED: &str = "❌ You are not authorized to use this command.";
pub const CHANNELS_ONLY: &str = "❌ This command can only be used in channels.";
pub const ENABLED: &str = "✅ Bot enabled! I will now automatically improve post captions using AI.";
pub const DISABLED: &str = "🔇 Bot disabled! I will no longer edit post captions.";

#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum Command {
    #[command(description = "enable bot for this channel")]
    Enable,
    #[command(description = "disable bot for this channel")]
    Disable,
    #[command(description = "check current bot status")]
    Status,
    #[command(description = "show this help message")]
    Help,
}

/// Where a command came from and who sent it.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub chat_id: ChatId,
    pub chat_title: Option<String>,
    pub destination: Destination,
    /// `None` when Telegram does not reveal the author, as in channel posts.
    pub user: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub format: ReplyFormat,
}

impl Reply {
    fn plain(text: &str) -> Self {
        Self { text: text.to_string(), format: ReplyFormat::Plain }
    }

    fn markdown(text: String) -> Self {
        Self { text, format: ReplyFormat::MarkdownV2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub reply: Reply,
    pub change: Option<ConfigChange>,
    /// The invoker was not allowed to run the command here.
    pub rejected: bool,
}

impl CommandOutcome {
    fn reply_only(reply: Reply) -> Self {
        Self { reply, change: None, rejected: false }
    }

    fn rejected(text: &str) -> Self {
        Self { reply: Reply::plain(text), change: None, rejected: true }
    }
}

/// Decide the reply and config change for a command without side effects.
pub fn evaluate(cmd: Command, inv: &Invocation, config: &BotConfig) -> CommandOutcome {
    let is_admin = inv.user.is_some_and(|user| auth::is_admin(config, user));

    match cmd {
        Command::Help => CommandOutcome::reply_only(Reply::markdown(help_text())),
        Command::Status => {
            if !is_admin {
                return CommandOutcome::rejected(NOT_AUTHORIZED);
            }
            let enabled = auth::is_channel_enabled(config, inv.chat_id);
            CommandOutcome::reply_only(Reply::markdown(status_text(inv.chat_title.as_deref(), enabled)))
        }
        Command::Enable | Command::Disable => {
            if !is_admin {
                return CommandOutcome::rejected(NOT_AUTHORIZED);
            }
            if !inv.destination.can_be_enabled() {
                return CommandOutcome::rejected(CHANNELS_ONLY);
            }
            let (change, text) = if cmd == Command::Enable {
                (ConfigChange::Enable(inv.chat_id), ENABLED)
            } else {
                (ConfigChange::Disable(inv.chat_id), DISABLED)
            };
            CommandOutcome { reply: Reply::plain(text), change: Some(change), rejected: false }
        }
    }
}

fn status_text(chat_title: Option<&str>, enabled: bool) -> String {
    let status = if enabled { "✅ Enabled" } else { "🔇 Disabled" };
    format!(
        "📊 {}\n\n🏷️ Channel: {}\n📡 Status: {}\n\n{}",
        markdown::bold("Bot Status"),
        markdown::escape(chat_title.unwrap_or("Unknown Channel")),
        status,
        markdown::escape("Use /enable or /disable to change status."),
    )
}

fn help_text() -> String {
    let commands = [
        ("/enable", "Enable bot for this channel"),
        ("/disable", "Disable bot for this channel"),
        ("/status", "Check current bot status"),
        ("/help", "Show this help message"),
    ]
    .map(|(cmd, what)| markdown::escape(&format!("• {cmd} - {what}")))
    .join("\n");

    let features = [
        "✨ Automatically improves post captions",
        "📝 Makes text clear and logical",
        "😊 Adds appropriate emojis (not too many!)",
        "🔧 Easy enable/disable control",
    ]
    .map(markdown::escape)
    .join("\n");

    format!(
        "🤖 {}\n\n{}\n\n{}\n{}\n\n{}\n{}\n\n{} {}\n{}",
        markdown::bold("Caption Bot Help"),
        markdown::escape("This bot automatically improves channel post captions using AI."),
        markdown::bold("Commands:"),
        commands,
        markdown::bold("Features:"),
        features,
        markdown::bold("Note:"),
        markdown::escape("Only authorized admins can control the bot."),
        markdown::escape(
            "Posts sent as the channel carry no author, so commands posted there are rejected. \
             Add the channel ID to enabledChannels in the bot config file instead.",
        ),
    )
}

/// Evaluate a command, apply its config change and send the reply.
/// Send failures are logged and dropped.
pub async fn handle_command<T>(
    cmd: Command,
    inv: &Invocation,
    store: &ConfigStore,
    transport: &T,
) -> CommandOutcome
where
    T: Transport + ?Sized,
{
    let config = store.snapshot().await;
    let outcome = evaluate(cmd, inv, &config);
    let name = inv.chat_title.clone().unwrap_or_else(|| inv.chat_id.to_string());

    match outcome.change {
        Some(change @ ConfigChange::Enable(_)) => {
            store.apply(change).await;
            info!("✅ Bot enabled for channel: {name}");
        }
        Some(change @ ConfigChange::Disable(_)) => {
            store.apply(change).await;
            info!("🔇 Bot disabled for channel: {name}");
        }
        None if outcome.rejected => {
            info!("Rejected {cmd:?} from {:?} in {name}", inv.user);
        }
        None => {}
    }

    if let Err(e) = transport
        .send_message(inv.chat_id, &outcome.reply.text, outcome.reply.format)
        .await
    {
        warn!("Failed to reply to {cmd:?}: {e}");
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::testing::RecordingTransport;
    use tempfile::TempDir;

    const CHANNEL: ChatId = ChatId(-1001234567890);
    const ADMIN: UserId = UserId(42);

    fn invocation(user: Option<UserId>, destination: Destination) -> Invocation {
        Invocation {
            chat_id: CHANNEL,
            chat_title: Some("Deals_&_Steals".to_string()),
            destination,
            user,
        }
    }

    fn admin_config() -> BotConfig {
        BotConfig {
            enabled_channels: Default::default(),
            admin_users: [ADMIN].into(),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/enable", "captionbot").unwrap(), Command::Enable);
        assert_eq!(Command::parse("/disable@captionbot", "captionbot").unwrap(), Command::Disable);
        assert_eq!(Command::parse("/status", "captionbot").unwrap(), Command::Status);
        assert_eq!(Command::parse("/help", "captionbot").unwrap(), Command::Help);
        assert!(Command::parse("/start", "captionbot").is_err());
    }

    #[test]
    fn test_enable_by_admin_in_channel() {
        let outcome = evaluate(Command::Enable, &invocation(Some(ADMIN), Destination::Broadcast), &admin_config());
        assert_eq!(outcome.change, Some(ConfigChange::Enable(CHANNEL)));
        assert_eq!(outcome.reply, Reply::plain(ENABLED));
        assert!(!outcome.rejected);
    }

    #[test]
    fn test_disable_by_admin_in_channel() {
        let outcome = evaluate(Command::Disable, &invocation(Some(ADMIN), Destination::Broadcast), &admin_config());
        assert_eq!(outcome.change, Some(ConfigChange::Disable(CHANNEL)));
        assert_eq!(outcome.reply, Reply::plain(DISABLED));
    }

    #[test]
    fn test_enable_rejects_non_admin() {
        let outcome = evaluate(Command::Enable, &invocation(Some(UserId(7)), Destination::Broadcast), &admin_config());
        assert_eq!(outcome.change, None);
        assert_eq!(outcome.reply.text, NOT_AUTHORIZED);
        assert!(outcome.rejected);
    }

    #[test]
    fn test_anonymous_author_is_not_admin() {
        let outcome = evaluate(Command::Enable, &invocation(None, Destination::Broadcast), &admin_config());
        assert_eq!(outcome.change, None);
        assert_eq!(outcome.reply.text, NOT_AUTHORIZED);
        assert!(outcome.rejected);
    }

    #[test]
    fn test_enable_rejects_non_channel() {
        for destination in [Destination::Group, Destination::Private] {
            let outcome = evaluate(Command::Enable, &invocation(Some(ADMIN), destination), &admin_config());
            assert_eq!(outcome.change, None);
            assert_eq!(outcome.reply.text, CHANNELS_ONLY);
            assert!(outcome.rejected);
        }
    }

    #[test]
    fn test_admin_check_comes_before_channel_check() {
        let outcome = evaluate(Command::Disable, &invocation(Some(UserId(7)), Destination::Group), &admin_config());
        assert_eq!(outcome.reply.text, NOT_AUTHORIZED);
    }

    #[test]
    fn test_status_requires_admin_only() {
        let outcome = evaluate(Command::Status, &invocation(Some(ADMIN), Destination::Group), &admin_config());
        assert_eq!(outcome.change, None);
        assert!(!outcome.rejected);
        assert_eq!(outcome.reply.format, ReplyFormat::MarkdownV2);
        assert!(outcome.reply.text.contains("🔇 Disabled"));

        let outcome = evaluate(Command::Status, &invocation(Some(UserId(7)), Destination::Broadcast), &admin_config());
        assert_eq!(outcome.reply.text, NOT_AUTHORIZED);
        assert!(outcome.rejected);
    }

    #[test]
    fn test_status_escapes_title() {
        let outcome = evaluate(Command::Status, &invocation(Some(ADMIN), Destination::Broadcast), &admin_config());
        assert!(outcome.reply.text.contains("Deals\\_&\\_Steals"));
        assert!(outcome.reply.text.contains("*Bot Status*"));
        assert!(outcome.reply.text.ends_with("change status\\."));
    }

    #[test]
    fn test_status_without_title() {
        let mut inv = invocation(Some(ADMIN), Destination::Broadcast);
        inv.chat_title = None;
        let outcome = evaluate(Command::Status, &inv, &admin_config());
        assert!(outcome.reply.text.contains("Unknown Channel"));
    }

    #[test]
    fn test_help_is_unrestricted() {
        let outcome = evaluate(Command::Help, &invocation(None, Destination::Private), &BotConfig::default());
        assert_eq!(outcome.change, None);
        assert_eq!(outcome.reply.format, ReplyFormat::MarkdownV2);
        assert!(outcome.reply.text.contains("/enable"));
        assert!(outcome.reply.text.contains("\\(not too many\\!\\)"));
        assert!(!outcome.rejected);
    }

    #[test]
    fn test_help_explains_channel_setup() {
        let outcome = evaluate(Command::Help, &invocation(None, Destination::Broadcast), &BotConfig::default());
        assert!(outcome.reply.text.contains("carry no author"));
        assert!(outcome.reply.text.contains("enabledChannels in the bot config file"));
    }

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::load(dir.path().join("bot-config.json"), Some(ADMIN))
    }

    #[tokio::test]
    async fn test_enable_then_status_reports_enabled() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let transport = RecordingTransport::new();
        let inv = invocation(Some(ADMIN), Destination::Broadcast);

        handle_command(Command::Enable, &inv, &store, &transport).await;
        let status = handle_command(Command::Status, &inv, &store, &transport).await;

        assert!(status.reply.text.contains("✅ Enabled"));
        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text, ENABLED);
        assert!(sent.iter().all(|m| m.chat_id == CHANNEL));
    }

    #[tokio::test]
    async fn test_disable_then_status_reports_disabled() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let transport = RecordingTransport::new();
        let inv = invocation(Some(ADMIN), Destination::Broadcast);

        handle_command(Command::Enable, &inv, &store, &transport).await;
        handle_command(Command::Disable, &inv, &store, &transport).await;
        let status = handle_command(Command::Status, &inv, &store, &transport).await;

        assert!(status.reply.text.contains("🔇 Disabled"));
        assert!(store.snapshot().await.enabled_channels.is_empty());
    }

    #[tokio::test]
    async fn test_non_admin_enable_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let transport = RecordingTransport::new();

        handle_command(Command::Enable, &invocation(Some(UserId(7)), Destination::Broadcast), &store, &transport).await;

        assert!(store.snapshot().await.enabled_channels.is_empty());
        assert!(!store.path().exists());
        assert_eq!(transport.sent_messages()[0].text, NOT_AUTHORIZED);
    }

    #[tokio::test]
    async fn test_enable_persists_to_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let transport = RecordingTransport::new();

        handle_command(Command::Enable, &invocation(Some(ADMIN), Destination::Broadcast), &store, &transport).await;

        let on_disk = BotConfig::read_from(store.path()).unwrap().unwrap();
        assert!(on_disk.enabled_channels.contains(&CHANNEL));
    }

    #[tokio::test]
    async fn test_reply_failure_does_not_undo_change() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let transport = RecordingTransport::failing();

        let outcome =
            handle_command(Command::Enable, &invocation(Some(ADMIN), Destination::Broadcast), &store, &transport).await;

        assert_eq!(outcome.change, Some(ConfigChange::Enable(CHANNEL)));
        assert!(store.snapshot().await.enabled_channels.contains(&CHANNEL));
    }
}
