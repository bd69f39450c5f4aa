//! File-backed allow-list of enabled channels and admin users.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use teloxide::types::{ChatId, UserId};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Errors from reading or writing the config file.
#[derive(Debug)]
pub enum StoreError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Serialize(serde_json::Error),
    Write { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Serialize(source) => write!(f, "failed to serialize config: {}", source),
            Self::Write { path, source } => {
                write!(f, "failed to write config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(source) => Some(source),
            Self::Write { source, .. } => Some(source),
        }
    }
}

/// On-disk layout. Channel IDs are written as strings and admin IDs as
/// numbers; either form is accepted on read, for hand-edited files.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    enabled_channels: Vec<ChannelEntry>,
    #[serde(default)]
    admin_users: Vec<AdminEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChannelEntry {
    Text(String),
    Number(i64),
}

impl ChannelEntry {
    fn chat_id(&self) -> Option<ChatId> {
        match self {
            ChannelEntry::Text(s) => s.trim().parse().ok().map(ChatId),
            ChannelEntry::Number(n) => Some(ChatId(*n)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AdminEntry {
    Number(u64),
    Text(String),
    // Negative or fractional numbers and anything else
    Other(serde_json::Value),
}

impl AdminEntry {
    fn user_id(&self) -> Option<UserId> {
        match self {
            AdminEntry::Number(n) => Some(UserId(*n)),
            AdminEntry::Text(s) => s.trim().parse().ok().map(UserId),
            AdminEntry::Other(_) => None,
        }
    }
}

/// Enabled channels and admin users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotConfig {
    pub enabled_channels: HashSet<ChatId>,
    pub admin_users: HashSet<UserId>,
}

/// A mutation requested by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    Enable(ChatId),
    Disable(ChatId),
}

impl BotConfig {
    /// Read the config file. `Ok(None)` means the file does not exist.
    pub fn read_from(path: &Path) -> Result<Option<Self>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Read { path: path.to_path_buf(), source: e });
            }
        };
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Parse { path: path.to_path_buf(), source: e })?;

        let mut enabled_channels = HashSet::with_capacity(file.enabled_channels.len());
        for entry in &file.enabled_channels {
            match entry.chat_id() {
                Some(chat_id) => {
                    enabled_channels.insert(chat_id);
                }
                None => {
                    if let ChannelEntry::Text(raw) = entry {
                        warn!("Skipping invalid channel id {raw:?} in {}", path.display());
                    }
                }
            }
        }

        let mut admin_users = HashSet::with_capacity(file.admin_users.len());
        for entry in &file.admin_users {
            match entry.user_id() {
                Some(user_id) => {
                    admin_users.insert(user_id);
                }
                None => {
                    let raw = serde_json::to_string(entry).unwrap_or_default();
                    warn!("Skipping invalid admin id {raw} in {}", path.display());
                }
            }
        }

        Ok(Some(Self { enabled_channels, admin_users }))
    }

    pub async fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        let mut channels: Vec<i64> = self.enabled_channels.iter().map(|c| c.0).collect();
        channels.sort_unstable();
        let mut admins: Vec<u64> = self.admin_users.iter().map(|u| u.0).collect();
        admins.sort_unstable();

        let file = ConfigFile {
            enabled_channels: channels
                .into_iter()
                .map(|c| ChannelEntry::Text(c.to_string()))
                .collect(),
            admin_users: admins.into_iter().map(AdminEntry::Number).collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(StoreError::Serialize)?;

        tokio::fs::write(path, json)
            .await
            .map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })
    }

    /// Returns true if the set actually changed.
    pub fn apply(&mut self, change: ConfigChange) -> bool {
        match change {
            ConfigChange::Enable(chat_id) => self.enabled_channels.insert(chat_id),
            ConfigChange::Disable(chat_id) => self.enabled_channels.remove(&chat_id),
        }
    }
}

/// The single process-wide owner of [`BotConfig`]. All mutations go through
/// [`ConfigStore::apply`], which holds the lock across the file write.
pub struct ConfigStore {
    path: PathBuf,
    state: Mutex<BotConfig>,
}

impl ConfigStore {
    /// Load from `path`, falling back to an empty config on any error.
    pub fn load(path: impl Into<PathBuf>, admin_seed: Option<UserId>) -> Self {
        let path = path.into();
        let mut config = match BotConfig::read_from(&path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                info!("No config file at {}, starting empty", path.display());
                BotConfig::default()
            }
            Err(e) => {
                error!("❌ Error loading configuration: {e}");
                BotConfig::default()
            }
        };

        if let Some(admin) = admin_seed {
            config.admin_users.insert(admin);
        }

        info!(
            "✅ Configuration loaded: {} admin(s), {} enabled channel(s)",
            config.admin_users.len(),
            config.enabled_channels.len()
        );

        Self { path, state: Mutex::new(config) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> BotConfig {
        self.state.lock().await.clone()
    }

    /// Apply a change and persist it. Persistence failures are logged only.
    pub async fn apply(&self, change: ConfigChange) -> bool {
        let mut state = self.state.lock().await;
        let changed = state.apply(change);
        save_logged(&state, &self.path).await;
        changed
    }

    /// Write the current state to disk. Failures are logged only.
    pub async fn persist(&self) {
        let state = self.state.lock().await;
        save_logged(&state, &self.path).await;
    }
}

async fn save_logged(config: &BotConfig, path: &Path) {
    match config.write_to(path).await {
        Ok(()) => info!("💾 Configuration saved to {}", path.display()),
        Err(e) => error!("❌ Error saving configuration: {e}"),
    }
}
