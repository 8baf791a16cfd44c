use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod channels;

pub use channels::{ChannelEntry, ChannelMonitorConfig, resolve_channels};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Path the document was loaded from - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Slack user whose token is used for every API call
    #[serde(default = "default_username")]
    pub username: String,

    /// trace | debug | info | warn | error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Credentials file override (default: ~/.project8_authentications.json)
    #[serde(default)]
    pub auth_file: Option<String>,

    #[serde(default = "default_slack_api_base")]
    pub slack_api_base: String,

    /// How long shutdown waits for workers before giving up on them
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Pending channel registrations the event router will buffer
    #[serde(default = "default_router_buffer")]
    pub router_buffer: usize,

    /// Live message events buffered per monitored channel
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Interval between RTM keepalive pings
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Monitored channels, keyed by channel name
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelEntry>,
}

fn default_username() -> String {
    "project8".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".into()
}

fn default_shutdown_timeout_ms() -> u64 {
    1000
}

fn default_router_buffer() -> usize {
    10
}

fn default_channel_buffer() -> usize {
    100
}

fn default_ping_interval_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            username: default_username(),
            log_level: default_log_level(),
            auth_file: None,
            slack_api_base: default_slack_api_base(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            router_buffer: default_router_buffer(),
            channel_buffer: default_channel_buffer(),
            ping_interval_secs: default_ping_interval_secs(),
            channels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

impl Config {
    /// Read, parse and validate the configuration document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    /// Parse a document whose format is chosen by the extension of `path`.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let parsed = match DocumentFormat::for_path(path) {
            DocumentFormat::Json => {
                serde_json::from_str::<Self>(contents).map_err(|e| e.to_string())
            }
            DocumentFormat::Toml => toml::from_str::<Self>(contents).map_err(|e| e.to_string()),
        };
        let mut config = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Validation("username must not be empty".into()));
        }
        self.log_level()?;
        if !(self.slack_api_base.starts_with("https://")
            || self.slack_api_base.starts_with("http://"))
        {
            return Err(ConfigError::Validation(format!(
                "slack-api-base must be an http(s) URL, got {}",
                self.slack_api_base
            )));
        }
        if self.router_buffer == 0 {
            return Err(ConfigError::Validation("router-buffer must be >= 1".into()));
        }
        if self.channel_buffer == 0 {
            return Err(ConfigError::Validation("channel-buffer must be >= 1".into()));
        }
        if self.ping_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "ping-interval-secs must be >= 1".into(),
            ));
        }
        Ok(())
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(self.log_level.trim()).map_err(|_| {
            ConfigError::Validation(format!("invalid log-level value: {}", self.log_level))
        })
    }

    /// Explicit credentials path, tilde-expanded. `None` means the default location.
    pub fn auth_file_path(&self) -> Option<PathBuf> {
        self.auth_file
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}
