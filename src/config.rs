use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use teloxide::types::UserId;

const DEFAULT_CONFIG_PATH: &str = "bot-config.json";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const OPTIONAL_VARS: [&str; 4] = ["ADMIN_USER_ID", "BOT_CONFIG_PATH", "GEMINI_MODEL", "LOG_DIR"];

/// Errors that can occur when loading settings.
#[derive(Debug)]
pub enum ConfigError {
    /// A variable is missing or has the wrong type.
    Env(envy::Error),
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(source) => write!(f, "failed to read environment: {}", source),
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Env(source) => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct EnvFile {
    telegram_bot_token: String,
    gemini_api_key: String,
    /// Seed admin, merged into the persisted admin set on every start.
    admin_user_id: Option<u64>,
    bot_config_path: Option<PathBuf>,
    gemini_model: Option<String>,
    log_dir: Option<PathBuf>,
}

/// Process settings. Everything here comes from the environment and is
/// never written back; the mutable allow-list lives in [`crate::store`].
#[derive(Debug)]
pub struct Settings {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub admin_user_id: Option<UserId>,
    /// Path of the JSON file with enabled channels and admins.
    pub config_path: PathBuf,
    pub gemini_model: String,
    /// Directory for log files. Defaults to `logs`.
    pub log_dir: PathBuf,
}

impl Settings {
    /// Load settings from the process environment, reading `.env` first if
    /// there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            eprintln!("No .env file found, using process environment only");
        }
        Self::from_iter(std::env::vars())
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // `ADMIN_USER_ID=` in a .env file means unset, not an unparsable id
        let vars = vars.into_iter().filter(|(key, value)| {
            !(value.trim().is_empty() && OPTIONAL_VARS.iter().any(|v| v.eq_ignore_ascii_case(key)))
        });
        let file: EnvFile = envy::from_iter(vars).map_err(ConfigError::Env)?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("TELEGRAM_BOT_TOKEN is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "TELEGRAM_BOT_TOKEN appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }
        if file.gemini_api_key.trim().is_empty() {
            return Err(ConfigError::Validation("GEMINI_API_KEY is required".into()));
        }

        let gemini_model = file
            .gemini_model
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            gemini_api_key: file.gemini_api_key,
            admin_user_id: file.admin_user_id.map(UserId),
            config_path: file
                .bot_config_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            gemini_model,
            log_dir: file.log_dir.unwrap_or_else(|| PathBuf::from("logs")),
        })
    }
}
