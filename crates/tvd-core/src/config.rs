use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per extractor call (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 1.0 = 1s).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/tvd/config.toml`, then
/// overridden by environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct TvdConfig {
    /// Telegram bot token. Usually supplied through `BOT_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Telegram user ids allowed to use admin commands.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    /// Largest file (in MB) the bot will upload back to the chat.
    pub max_file_size_mb: u64,
    /// Where finished downloads land. Defaults to `~/.local/share/tvd/downloads`.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// SQLite database path. Defaults to `~/.local/state/tvd/bot.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Jobs executed at once across all users.
    pub max_concurrent_downloads: usize,
    /// Jobs a single user may have running at once.
    pub max_jobs_per_user: usize,
    /// Accepted URL submissions per user per clock hour.
    pub rate_limit_per_hour: u32,
    pub enable_playlists: bool,
    /// Hard cap on entries fetched from one playlist.
    pub playlist_max_videos: usize,
    /// Entries of one playlist downloaded concurrently.
    pub playlist_parallelism: usize,
    /// Number of playlist files sent back to the chat.
    pub playlist_send_limit: usize,
    /// Playlist files larger than this (MB) stay on disk.
    pub playlist_send_max_mb: u64,
    /// yt-dlp format expression used when the user picks nothing specific.
    pub default_format: String,
    /// Subtitle languages fetched by the "everything" option.
    pub subtitle_languages: Vec<String>,
    /// Host substrings accepted by URL intake.
    pub supported_platforms: Vec<String>,
    /// yt-dlp executable name or absolute path.
    pub ytdlp_path: String,
    /// Seconds a pending menu stays valid.
    pub session_ttl_secs: u64,
    /// Minimum milliseconds between progress message edits.
    pub progress_interval_ms: u64,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for TvdConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_ids: Vec::new(),
            max_file_size_mb: 2000,
            download_dir: None,
            database_path: None,
            max_concurrent_downloads: 5,
            max_jobs_per_user: 2,
            rate_limit_per_hour: 10,
            enable_playlists: true,
            playlist_max_videos: 50,
            playlist_parallelism: 3,
            playlist_send_limit: 5,
            playlist_send_max_mb: 50,
            default_format: "best[height<=720]/best".to_string(),
            subtitle_languages: ["ar", "en", "fr", "es", "de"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            supported_platforms: default_platforms(),
            ytdlp_path: "yt-dlp".to_string(),
            session_ttl_secs: 900,
            progress_interval_ms: 2000,
            retry: None,
        }
    }
}

// Hand-written so the token never reaches the log file.
impl fmt::Debug for TvdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TvdConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("admin_ids", &self.admin_ids)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("download_dir", &self.download_dir)
            .field("database_path", &self.database_path)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("max_jobs_per_user", &self.max_jobs_per_user)
            .field("rate_limit_per_hour", &self.rate_limit_per_hour)
            .field("enable_playlists", &self.enable_playlists)
            .field("playlist_max_videos", &self.playlist_max_videos)
            .field("default_format", &self.default_format)
            .field("supported_platforms", &self.supported_platforms)
            .field("ytdlp_path", &self.ytdlp_path)
            .finish_non_exhaustive()
    }
}

fn default_platforms() -> Vec<String> {
    [
        "youtube.com",
        "youtu.be",
        "twitter.com",
        "x.com",
        "instagram.com",
        "facebook.com",
        "fb.watch",
        "tiktok.com",
        "vimeo.com",
        "dailymotion.com",
        "twitch.tv",
        "reddit.com",
        "bilibili.com",
        "nicovideo.jp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl TvdConfig {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Bot token, or an error explaining how to provide one.
    pub fn require_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("BOT_TOKEN is not set (export it or add bot_token to config.toml)")
            })
    }

    /// Effective download directory (config value or XDG data dir).
    pub fn resolved_download_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.download_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tvd")?;
        Ok(xdg_dirs.get_data_home().join("downloads"))
    }

    /// Effective database path (config value or XDG state dir).
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tvd")?;
        Ok(xdg_dirs.get_state_home().join("bot.db"))
    }

    /// Apply environment overrides using the given lookup (std::env::var in production).
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.bot_token = Some(token.trim().to_string());
        }
        if let Some(ids) = lookup("ADMIN_IDS") {
            self.admin_ids = parse_admin_ids(&ids);
        }
        if let Some(v) = parse_env_number::<u64>(&lookup, "MAX_FILE_SIZE") {
            self.max_file_size_mb = v;
        }
        if let Some(dir) = lookup("DOWNLOAD_PATH").filter(|s| !s.trim().is_empty()) {
            self.download_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(path) = lookup("DATABASE_PATH").filter(|s| !s.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(v) = parse_env_number::<usize>(&lookup, "MAX_CONCURRENT") {
            self.max_concurrent_downloads = v.max(1);
        }
        if let Some(v) = parse_env_number::<u32>(&lookup, "RATE_LIMIT") {
            self.rate_limit_per_hour = v;
        }
        if let Some(v) = lookup("ENABLE_PLAYLIST") {
            self.enable_playlists = v.trim().eq_ignore_ascii_case("true");
        }
    }
}

/// Parse `ADMIN_IDS` ("1,2, 3"); blank and non-numeric entries are skipped.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("ignoring invalid admin id {:?}", s);
                None
            }
        })
        .collect()
}

fn parse_env_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tvd")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists,
/// then apply environment overrides.
pub fn load_or_init() -> Result<TvdConfig> {
    let path = config_path()?;
    let mut cfg = if !path.exists() {
        let default_cfg = TvdConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        default_cfg
    } else {
        let data = fs::read_to_string(&path)?;
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?
    };

    cfg.apply_env_with(|key| std::env::var(key).ok());
    Ok(cfg)
}
