// Configuration file handling

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".tradefedrc.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub bugreport: BugreportConfig,

    #[serde(default)]
    pub log_saver: LogSaverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CollectorConfig {
    /// Sum numeric run metrics when a run name is executed again
    #[serde(default)]
    pub aggregate_metrics: bool,
}

/// Which invocations produce a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Always,
    DeviceUnavailable,
    Failures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address; `None` uses the transport's default
    #[serde(default)]
    pub sender: Option<String>,

    #[serde(default)]
    pub destinations: Vec<String>,

    /// First word of every subject line
    #[serde(default = "default_subject_tag")]
    pub subject_tag: String,

    #[serde(default)]
    pub html: bool,

    #[serde(default)]
    pub policy: PolicyKind,

    /// File that rendered messages are appended to
    #[serde(default)]
    pub outbox: Option<PathBuf>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender: None,
            destinations: Vec::new(),
            subject_tag: default_subject_tag(),
            html: false,
            policy: PolicyKind::default(),
            outbox: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugreportConfig {
    /// Seconds to wait for the device before each capture
    #[serde(default = "default_device_wait_secs")]
    pub device_wait_secs: u64,

    #[serde(default)]
    pub descriptive_name: Option<String>,

    /// Capture rules in their textual form, e.g. `AFTER_EACH_FAILED_TESTCASE`
    #[serde(default)]
    pub predicates: Vec<String>,
}

impl Default for BugreportConfig {
    fn default() -> Self {
        Self {
            device_wait_secs: default_device_wait_secs(),
            descriptive_name: None,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogSaverConfig {
    /// Root of the saved log tree; logs are not saved when unset
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
}

pub fn default_subject_tag() -> String {
    String::from("Tradefed")
}

fn default_device_wait_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Option<Self> {
        // Check locations in order:
        // 1. .tradefedrc.toml (current directory)
        // 2. ~/.tradefedrc.toml (home directory)
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(CONFIG_FILE_NAME));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAME));
        }

        let path = paths.iter().find(|path| path.exists())?;
        tracing::debug!("loading configuration from {}", path.display());
        Self::load_from_file(path)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let config = Self::parse(&content);
        if config.is_none() {
            tracing::warn!("ignoring malformed configuration {}", path.display());
        }
        config
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Option<Self> {
        toml::from_str(content).ok()
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|_| String::new())
    }
}
