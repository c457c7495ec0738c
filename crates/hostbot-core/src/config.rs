use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{domain::ChatId, errors::Error, security::AllowList, Result};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const PLACEHOLDER_TOKEN: &str = "YOUR_TELEGRAM_BOT_TOKEN";
const PLACEHOLDER_CHAT: i64 = 123_456_789;

/// Typed configuration, read once at startup and immutable afterwards.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub allowed_chats: Vec<i64>,
    /// Long-poll timeout, seconds.
    #[serde(default = "default_update_timeout")]
    pub update_timeout: u64,
}

/// Alert thresholds. A threshold of 0 (or a missing key) disables that check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Seconds between alert ticks; 0 disables the alert loop.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default)]
    pub cpu_threshold: u32,
    #[serde(default)]
    pub memory_threshold: u32,
    /// Minimum free space per disk, percent.
    #[serde(default)]
    pub disk_threshold: u32,
    /// Alert destination; the first allowed chat when unset.
    #[serde(default)]
    pub notify_chat: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_socket")]
    pub socket: String,
    /// Seconds; bounds the startup availability probe.
    #[serde(default = "default_docker_timeout")]
    pub timeout: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_true")]
    pub use_sudo: bool,
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: u32,
}

fn default_update_timeout() -> u64 {
    60
}

fn default_check_interval() -> u64 {
    30
}

fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

fn default_docker_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_log_tail_lines() -> u32 {
    100
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            allowed_chats: Vec::new(),
            update_timeout: default_update_timeout(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            cpu_threshold: 0,
            memory_threshold: 0,
            disk_threshold: 0,
            notify_chat: None,
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: default_docker_socket(),
            timeout: default_docker_timeout(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            use_sudo: true,
            log_tail_lines: default_log_tail_lines(),
        }
    }
}

impl Config {
    /// Load `$HOSTBOT_CONFIG` (or `./config.yaml`), creating it with the
    /// documented defaults when missing, then apply environment overrides.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let path = env_path("HOSTBOT_CONFIG").unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = Self::load_or_create(&path)?;
        cfg.apply_env_overrides();
        cfg.validate()?;

        info!(
            path = %path.display(),
            allowed_chats = cfg.bot.allowed_chats.len(),
            "configuration loaded"
        );
        Ok(cfg)
    }

    /// The values written when no config file exists. The token and chat id
    /// are placeholders and must be replaced before the bot can run.
    pub fn documented_defaults() -> Self {
        Self {
            bot: BotConfig {
                token: PLACEHOLDER_TOKEN.to_string(),
                allowed_chats: vec![PLACEHOLDER_CHAT],
                update_timeout: default_update_timeout(),
            },
            monitoring: MonitoringConfig {
                check_interval: 30,
                cpu_threshold: 90,
                memory_threshold: 0,
                disk_threshold: 10,
                notify_chat: None,
            },
            docker: DockerConfig::default(),
            host: HostConfig::default(),
        }
    }

    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let defaults = Self::documented_defaults();
            defaults.write_to(path)?;
            warn!(
                path = %path.display(),
                "config file not found; created one with default values"
            );
            return Ok(defaults);
        }

        let txt = fs::read_to_string(path)?;
        Self::from_yaml_str(&txt)
    }

    pub fn from_yaml_str(txt: &str) -> Result<Self> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(txt)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(token) = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty) {
            self.bot.token = token;
        }
        let chats = parse_csv_i64(env_str("TELEGRAM_ALLOWED_CHATS"));
        if !chats.is_empty() {
            self.bot.allowed_chats = chats;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot.token.trim().is_empty() {
            return Err(Error::Config(
                "bot.token (or TELEGRAM_BOT_TOKEN) is required".to_string(),
            ));
        }
        if self.bot.allowed_chats.is_empty() {
            return Err(Error::Config(
                "bot.allowed_chats (or TELEGRAM_ALLOWED_CHATS) must list at least one chat"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.bot.allowed_chats.iter().copied())
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.update_timeout)
    }

    /// `None` when the alert loop is disabled.
    pub fn check_interval(&self) -> Option<Duration> {
        match self.monitoring.check_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn alert_destination(&self) -> Option<ChatId> {
        self.monitoring
            .notify_chat
            .or_else(|| self.bot.allowed_chats.first().copied())
            .map(ChatId)
    }

    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker.timeout)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }

        env::set_var(key, val);
    }
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
