//! Configuration for filerelay.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TELEGRAM_BOT_TOKEN, PORT, FILERELAY_*)
//! 2. Config file (.filerelay/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .filerelay/config.yaml
//! - Falls back to the user config dir (e.g. ~/.config/filerelay/config.yaml)
//! - Paths in config file are relative to the config file's parent directory

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::telegram::TELEGRAM_API_BASE;
use crate::adapters::upload::DEFAULT_UPLOAD_BASE;

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND: &str = "FILERELAY_BIND";
pub const ENV_STAGING_DIR: &str = "FILERELAY_STAGING_DIR";
pub const ENV_UPLOAD_BASE: &str = "FILERELAY_UPLOAD_BASE";
pub const ENV_UPLOAD_TIMEOUT: &str = "FILERELAY_UPLOAD_TIMEOUT_SECS";
pub const ENV_POLL_TIMEOUT: &str = "FILERELAY_POLL_TIMEOUT_SECS";
pub const ENV_MAX_RUNS: &str = "FILERELAY_MAX_CONCURRENT_RUNS";
pub const ENV_ISOLATE_RUNS: &str = "FILERELAY_ISOLATE_RUNS";

/// Errors that can occur while resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TELEGRAM_BOT_TOKEN environment variable not set!")]
    MissingToken,

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub liveness: LivenessSection,
    #[serde(default)]
    pub staging: StagingSection,
    #[serde(default)]
    pub upload: UploadSection,
    #[serde(default)]
    pub relay: RelaySection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
    pub api_base: Option<String>,
    pub poll_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LivenessSection {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StagingSection {
    /// Staging directory (relative to config file)
    pub dir: Option<String>,
    pub isolate_runs: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSection {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelaySection {
    pub max_concurrent_runs: Option<usize>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub telegram_api_base: String,
    pub poll_timeout: Duration,
    pub liveness_addr: SocketAddr,
    pub staging_dir: PathBuf,
    pub isolate_runs: bool,
    pub upload_base: String,
    pub upload_timeout: Duration,
    /// `None` leaves relay runs unbounded
    pub max_concurrent_runs: Option<usize>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// The subset of settings the upload client needs. Resolves without a bot
/// token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub upload_base: String,
    pub upload_timeout: Duration,
}

impl UploadSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let config_file = find_config_file();
        Self::resolve(|key| std::env::var(key).ok(), config_file.as_deref())
    }

    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let file = match config_file {
            Some(path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };
        Self::from_sources(|key| non_blank(env(key)), &file.upload)
    }

    fn from_sources(
        lookup: impl Fn(&str) -> Option<String>,
        section: &UploadSection,
    ) -> Result<Self, ConfigError> {
        let upload_base = lookup(ENV_UPLOAD_BASE)
            .or_else(|| section.base_url.clone())
            .unwrap_or_else(|| DEFAULT_UPLOAD_BASE.to_string());
        let timeout_secs = match lookup(ENV_UPLOAD_TIMEOUT) {
            Some(v) => parse(ENV_UPLOAD_TIMEOUT, &v)?,
            None => section.timeout_seconds.unwrap_or(60),
        };

        Ok(Self {
            upload_base,
            upload_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Settings {
    /// Load configuration from the process environment and any config file
    pub fn load() -> Result<Self, ConfigError> {
        let config_file = find_config_file();
        Self::resolve(|key| std::env::var(key).ok(), config_file.as_deref())
    }

    /// Resolve settings from an environment lookup and an optional config file
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let file = match config_file {
            Some(path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        // Relative paths in the file are relative to the project root
        let base_dir = config_file
            .and_then(|p| p.parent()) // .filerelay/
            .and_then(|p| p.parent()) // project root
            .unwrap_or(Path::new("."));

        let lookup = |key: &str| non_blank(env(key));

        let bot_token = lookup(ENV_BOT_TOKEN)
            .or(file.telegram.bot_token)
            .ok_or(ConfigError::MissingToken)?;

        let port = match lookup(ENV_PORT) {
            Some(v) => parse(ENV_PORT, &v)?,
            None => file.liveness.port.unwrap_or(8080),
        };
        let bind = match lookup(ENV_BIND) {
            Some(v) => parse(ENV_BIND, &v)?,
            None => file
                .liveness
                .bind
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        };

        let staging_dir = match lookup(ENV_STAGING_DIR) {
            Some(v) => PathBuf::from(v),
            None => file
                .staging
                .dir
                .as_deref()
                .map(|d| resolve_path(base_dir, d))
                .unwrap_or_else(|| PathBuf::from("/tmp")),
        };
        let isolate_runs = match lookup(ENV_ISOLATE_RUNS) {
            Some(v) => parse_bool(ENV_ISOLATE_RUNS, &v)?,
            None => file.staging.isolate_runs.unwrap_or(false),
        };

        let upload = UploadSettings::from_sources(&lookup, &file.upload)?;
        let poll_timeout_secs = match lookup(ENV_POLL_TIMEOUT) {
            Some(v) => parse(ENV_POLL_TIMEOUT, &v)?,
            None => file.telegram.poll_timeout_seconds.unwrap_or(30),
        };

        let max_concurrent_runs = match lookup(ENV_MAX_RUNS) {
            Some(v) => Some(parse::<usize>(ENV_MAX_RUNS, &v)?),
            None => file.relay.max_concurrent_runs,
        };
        if max_concurrent_runs == Some(0) {
            return Err(ConfigError::Invalid {
                key: ENV_MAX_RUNS.to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bot_token,
            telegram_api_base: file
                .telegram
                .api_base
                .unwrap_or_else(|| TELEGRAM_API_BASE.to_string()),
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            liveness_addr: SocketAddr::new(bind, port),
            staging_dir,
            isolate_runs,
            upload_base: upload.upload_base,
            upload_timeout: upload.upload_timeout,
            max_concurrent_runs,
            config_file: config_file.map(Path::to_path_buf),
        })
    }

    /// Bot token with everything but the bot ID hidden
    pub fn redacted_token(&self) -> String {
        match self.bot_token.split_once(':') {
            Some((id, _)) => format!("{}:***", id),
            None => "***".to_string(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Find config file by searching current directory and parents, then the
/// user config directory
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".filerelay").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::config_dir()
        .map(|d| d.join("filerelay").join("config.yaml"))
        .filter(|p| p.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
