//! Lancea configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::events::{DEFAULT_CHANNEL_CAPACITY, default_journal_path};
use crate::resolver::{CommandRegistry, CommandSpec};

/// Main Lancea configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Socket the engine listens on; defaults to the runtime dir
    #[serde(rename = "socket-path", skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Engine tuning
    pub engine: EngineConfig,

    /// Commands added to the built-in registry
    pub commands: Vec<CommandSpec>,

    /// Event journal
    pub journal: JournalConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .lancea.yml
        let local_config = PathBuf::from(".lancea.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/lancea/lancea.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(".lancea.yml"))
                .chain(user_config_path())
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::parse_file(&p).ok())
            .and_then(|config| config.log_level)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::parse_file(path.as_ref())?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Socket path from config, falling back to the runtime dir
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(crate::ipc::get_socket_path)
    }

    /// Built-in commands plus the configured ones
    pub fn command_registry(&self) -> CommandRegistry {
        let mut registry = CommandRegistry::with_builtins();
        for spec in &self.commands {
            registry.register(spec.clone());
        }
        registry
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lancea").join("lancea.yml"))
}

/// Engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the push event channel
    #[serde(rename = "event-capacity")]
    pub event_capacity: usize,

    /// Batches a provider may queue before its sends wait
    #[serde(rename = "batch-buffer")]
    pub batch_buffer: usize,

    /// Upper bound on one provider's search, in milliseconds
    #[serde(rename = "search-timeout-ms")]
    pub search_timeout_ms: u64,

    #[serde(rename = "preview-timeout-ms")]
    pub preview_timeout_ms: u64,

    #[serde(rename = "execute-timeout-ms")]
    pub execute_timeout_ms: u64,

    /// Reject preview/execute for keys not delivered in the current epoch
    #[serde(rename = "strict-keys")]
    pub strict_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
            batch_buffer: 32,
            search_timeout_ms: 10_000,
            preview_timeout_ms: 2_000,
            execute_timeout_ms: 5_000,
            strict_keys: true,
        }
    }
}

impl EngineConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_millis(self.preview_timeout_ms)
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_millis(self.execute_timeout_ms)
    }
}

/// Event journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,

    /// Journal file; `~/` is expanded
    pub path: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_journal_path().to_string_lossy().into_owned(),
        }
    }
}

impl JournalConfig {
    /// Path with a leading `~/` expanded
    pub fn expanded_path(&self) -> PathBuf {
        match self.path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.path)),
            None => PathBuf::from(&self.path),
        }
    }
}
