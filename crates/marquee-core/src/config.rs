//! Configuration management for marquee.
//!
//! Loads configuration from ${MARQUEE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Conversation session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity after which a session starts over.
    pub timeout_secs: u64,
    /// How often expired sessions are swept from memory.
    pub sweep_interval_secs: u64,
    /// Turns kept in the rolling message history.
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
            history_limit: crate::session::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Search and outbound-call settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Most results offered in one list.
    pub max_results: usize,
    /// Hard deadline for each call to the catalog or a library.
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            request_timeout_secs: 15,
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPeriod {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl QuotaPeriod {
    pub fn label(self) -> &'static str {
        match self {
            QuotaPeriod::Daily => "today",
            QuotaPeriod::Weekly => "this week",
            QuotaPeriod::Monthly => "this month",
        }
    }
}

/// Per-user request quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub enabled: bool,
    pub period: QuotaPeriod,
    /// Movies per period; 0 means unlimited.
    pub movie_limit: u32,
    /// TV shows per period; 0 means unlimited.
    pub tv_limit: u32,
    /// Admins bypass quotas.
    pub exempt_admins: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: QuotaPeriod::Weekly,
            movie_limit: 0,
            tv_limit: 0,
            exempt_admins: true,
        }
    }
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token for Telegram API.
    pub bot_token: Option<String>,
}

/// Metadata catalog (TMDB) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
        }
    }
}

/// Movie library (Radarr) configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieLibraryConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub root_folder: Option<String>,
    pub quality_profile_id: Option<u64>,
}

/// Series library (Sonarr) configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesLibraryConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub root_folder: Option<String>,
    pub quality_profile_id: Option<u64>,
    /// Used instead of `root_folder` for anime.
    pub anime_root_folder: Option<String>,
    /// Used instead of `quality_profile_id` for anime.
    pub anime_quality_profile_id: Option<u64>,
}

/// An authorized person and every chat identity they use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub name: String,
    pub admin: bool,
    /// `platform:rawId` identities, e.g. `telegram:123456`.
    pub identities: Vec<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub search: SearchConfig,
    pub quota: QuotaConfig,
    pub telegram: TelegramConfig,
    pub tmdb: TmdbConfig,
    pub radarr: MovieLibraryConfig,
    pub sonarr: SeriesLibraryConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserConfig>,
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

pub mod paths {
    //! Path resolution for marquee configuration and data files.
    //!
    //! MARQUEE_HOME resolution order:
    //! 1. MARQUEE_HOME environment variable (if set)
    //! 2. ~/.config/marquee (default)
    //! 3. ./.marquee when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the marquee home directory.
    pub fn marquee_home() -> PathBuf {
        if let Ok(home) = std::env::var("MARQUEE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".marquee"),
            |h| h.join(".config").join("marquee"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        marquee_home().join("config.toml")
    }

    /// Returns the path to the request ledger.
    pub fn requests_path() -> PathBuf {
        marquee_home().join("requests.jsonl")
    }
}
