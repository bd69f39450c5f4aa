mod auth;
mod commands;
mod config;
mod gemini;
mod post;
mod rewriter;
mod store;
mod telegram;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use commands::{Command, Invocation};
use config::Settings;
use gemini::GeminiClient;
use post::EditLedger;
use rewriter::CaptionRewriter;
use store::ConfigStore;
use telegram::TelegramClient;

struct BotState {
    store: ConfigStore,
    rewriter: CaptionRewriter<GeminiClient>,
    telegram: TelegramClient,
    ledger: EditLedger,
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logging(&settings.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ Failed to open log file in {}: {e}", settings.log_dir.display());
            return ExitCode::FAILURE;
        }
    };

    let store = ConfigStore::load(&settings.config_path, settings.admin_user_id);
    let bot = Bot::new(&settings.telegram_bot_token);

    let me = match bot.get_me().await {
        Ok(me) => me,
        Err(e) => {
            error!("❌ Error initializing bot: {e}");
            return ExitCode::FAILURE;
        }
    };

    let gemini = GeminiClient::new(settings.gemini_api_key.clone(), settings.gemini_model.clone());

    info!("🚀 Bot started successfully!");
    info!("📱 Bot Username: @{}", me.username());
    info!("🆔 Bot ID: {}", me.id);
    info!("🧠 Model: {}", gemini.model());
    info!("📁 Config file: {}", store.path().display());
    {
        let config = store.snapshot().await;
        let mut admins: Vec<u64> = config.admin_users.iter().map(|u| u.0).collect();
        admins.sort_unstable();
        info!("👥 Admin Users: {admins:?}");
        info!("📢 Enabled Channels: {}", config.enabled_channels.len());
    }
    info!("💡 Use /help in any channel to see available commands.");

    let state = Arc::new(BotState {
        store,
        rewriter: CaptionRewriter::new(gemini),
        telegram: TelegramClient::new(bot.clone()),
        ledger: EditLedger::new(),
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().filter_command::<Command>().endpoint(handle_command))
        .branch(
            Update::filter_channel_post()
                .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
                .branch(dptree::endpoint(handle_channel_post)),
        )
        .branch(Update::filter_edited_channel_post().endpoint(handle_edited_channel_post));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state.clone()])
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("🛑 Shutting down bot...");
        // Shutdown is refused until the dispatcher has started polling
        loop {
            match shutdown.shutdown() {
                Ok(done) => {
                    done.await;
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    });

    let listener = update_listeners::polling_default(bot).await;
    dispatcher
        .dispatch_with_listener(listener, LoggingErrorHandler::with_custom_text("❌ Polling error"))
        .await;

    state.store.persist().await;
    info!("👋 Bye");
    ExitCode::SUCCESS
}

fn init_logging(log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("captionist.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to wait for Ctrl+C: {e}");
                }
            }
        }
    }

    #[cfg(not(unix))]
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to wait for Ctrl+C: {e}");
    }
}

async fn handle_command(msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let inv = Invocation {
        chat_id: msg.chat.id,
        chat_title: msg.chat.title().map(str::to_string),
        destination: telegram::destination_of(&msg.chat),
        user: msg.from.as_ref().map(|u| u.id),
    };
    commands::handle_command(cmd, &inv, &state.store, &state.telegram).await;
    Ok(())
}

async fn handle_channel_post(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    process_post(&msg, false, &state).await;
    Ok(())
}

async fn handle_edited_channel_post(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    process_post(&msg, true, &state).await;
    Ok(())
}

async fn process_post(msg: &Message, edited: bool, state: &BotState) {
    let post = telegram::incoming_post(msg, edited);
    let config = state.store.snapshot().await;
    let outcome = post::handle_post(&post, &config, &state.rewriter, &state.telegram, &state.ledger).await;
    debug!("Post {} in {} (edited: {edited}): {outcome:?}", msg.id.0, post.display_name());
}
