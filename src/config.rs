//! Configuration persistence with atomic writes.
//!
//! Stores supervisor configuration in a JSON file with:
//! - Atomic writes (write temp, rename)
//! - Corruption fallback (back up the bad file, use defaults)
//! - Range clamping for every numeric setting
//! - Platform-specific config paths

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Current schema version.
const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "KesaiDecryptRequest";

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_WINDOW_TITLE: &str = "柯赛解密申请";
pub const DEFAULT_NOTIFICATION_TITLE: &str = "柯赛解密申请消息通知";
pub const DEFAULT_NOTIFICATION_BODY: &str = "这是一条来自柯赛解密申请系统的桌面通知！";
pub const DEFAULT_DOWNLOAD_DIR_NAME: &str = "kesai-decrypt-request-updates";

/// Root supervisor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub autostart: AutostartConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            window: WindowConfig::default(),
            notification: NotificationConfig::default(),
            update: UpdateConfig::default(),
            autostart: AutostartConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Validate and clamp values to acceptable ranges.
    pub fn validate_and_clamp(&mut self) {
        if self.schema_version != CURRENT_SCHEMA_VERSION {
            log::warn!(
                "Config schema_version {} differs from {}, continuing with current schema",
                self.schema_version,
                CURRENT_SCHEMA_VERSION
            );
            self.schema_version = CURRENT_SCHEMA_VERSION;
        }

        self.window.width = self.window.width.clamp(400, 3840);
        self.window.height = self.window.height.clamp(300, 2160);
        if self.window.title.trim().is_empty() {
            self.window.title = DEFAULT_WINDOW_TITLE.to_string();
        }

        self.notification.width = self.notification.width.clamp(200, 800);
        self.notification.height = self.notification.height.clamp(100, 600);
        self.notification.margin_x = self.notification.margin_x.clamp(0, 200);
        self.notification.margin_y = self.notification.margin_y.clamp(0, 200);
        if self.notification.title.trim().is_empty() {
            self.notification.title = DEFAULT_NOTIFICATION_TITLE.to_string();
        }
        if self.notification.default_body.trim().is_empty() {
            self.notification.default_body = DEFAULT_NOTIFICATION_BODY.to_string();
        }

        self.update.request_timeout_secs = self.update.request_timeout_secs.clamp(5, 600);
        self.update.idle_timeout_secs = self.update.idle_timeout_secs.clamp(5, 600);
        self.update.max_redirects = self.update.max_redirects.clamp(1, 20);
        if !is_plain_dir_name(&self.update.download_dir_name) {
            log::warn!(
                "Invalid update download_dir_name '{}', using default",
                self.update.download_dir_name
            );
            self.update.download_dir_name = DEFAULT_DOWNLOAD_DIR_NAME.to_string();
        }
    }
}

/// Main window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

/// Persistent notification overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub width: u32,
    pub height: u32,
    /// Gap between the overlay and the right edge of the work area.
    pub margin_x: i32,
    /// Gap between the overlay and the bottom edge of the work area.
    pub margin_y: i32,
    pub title: String,
    /// Body used when a request carries no text.
    pub default_body: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            width: 360,
            height: 190,
            margin_x: 10,
            margin_y: 30,
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
            default_body: DEFAULT_NOTIFICATION_BODY.to_string(),
        }
    }
}

/// Update download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Time allowed for a request to produce response headers.
    pub request_timeout_secs: u64,
    /// Time allowed between two body chunks.
    pub idle_timeout_secs: u64,
    pub max_redirects: u32,
    /// Subdirectory of the platform temp dir that receives packages.
    pub download_dir_name: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            idle_timeout_secs: 60,
            max_redirects: 5,
            download_dir_name: DEFAULT_DOWNLOAD_DIR_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutostartConfig {
    pub enabled: bool,
}

impl Default for AutostartConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

fn is_plain_dir_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\', ':'])
}

/// Get the platform-specific config directory path.
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(CONFIG_DIR_NAME)
    }

    #[cfg(target_os = "windows")]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    #[cfg(target_os = "linux")]
    {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
            .join(CONFIG_DIR_NAME)
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        PathBuf::from(".").join(CONFIG_DIR_NAME)
    }
}

/// Get the full config file path.
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Load configuration, writing defaults on first run.
pub fn load_or_init_config() -> SupervisorConfig {
    load_or_init_config_at(&config_path())
}

/// Load configuration from `path`, writing defaults if the file is missing.
pub fn load_or_init_config_at(path: &Path) -> SupervisorConfig {
    let existed = path.exists();
    let config = load_config_from_path(path);
    if !existed {
        if let Err(e) = save_config_to_path(&config, path) {
            log::warn!("Failed to write default config to {}: {}", path.display(), e);
        }
    }
    config
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist or is corrupted, returns defaults.
/// Corrupted files are backed up for debugging.
pub fn load_config_from_path(path: &Path) -> SupervisorConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<SupervisorConfig>(&content) {
            Ok(mut config) => {
                config.validate_and_clamp();
                config
            }
            Err(e) => {
                log::error!("Config parse error, using defaults: {}", e);
                let backup = path.with_extension("json.corrupt");
                if let Err(backup_err) = fs::rename(path, &backup) {
                    log::warn!("Failed to backup corrupt config: {}", backup_err);
                }
                SupervisorConfig::default()
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("No config file found, using defaults");
            SupervisorConfig::default()
        }
        Err(e) => {
            log::error!("Config read error, using defaults: {}", e);
            SupervisorConfig::default()
        }
    }
}

/// Save configuration to a specific path atomically.
pub fn save_config_to_path(config: &SupervisorConfig, path: &Path) -> Result<(), ConfigError> {
    let temp = path.with_extension("json.tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)?;
    fs::write(&temp, &json)?;
    fs::rename(&temp, path)?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
