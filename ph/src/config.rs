//! PanelHub configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::events::{DEFAULT_HISTORY_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER};

/// Main PanelHub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Chat-completion provider configuration
    pub llm: LlmConfig,

    /// Broadcast hub sizing
    pub hub: HubConfig,

    /// Transport endpoint configuration
    pub server: ServerConfig,

    /// Host scripting bridge configuration
    pub host: HostConfig,

    /// Override for the preference store location
    #[serde(rename = "prefs-path")]
    pub prefs_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::search_paths(),
        };

        paths
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    /// Project-local config first, then the user config dir
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".panelhub.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("panelhub").join("panelhub.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Where the preference store lives
    pub fn prefs_path(&self) -> PathBuf {
        self.prefs_path.clone().unwrap_or_else(crate::prefs::default_prefs_path)
    }
}

/// Chat-completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model used when a request does not name one
    pub model: String,

    /// Environment variable consulted when no key is stored in prefs
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// System message sent ahead of every prompt
    #[serde(rename = "system-prompt")]
    pub system_prompt: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries for transient failures (0 disables retrying)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-5-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            system_prompt: "You are a helpful assistant that answers user questions.".to_string(),
            timeout_ms: 120_000,
            max_retries: 0,
        }
    }
}

/// Broadcast hub sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Number of events retained for snapshots
    #[serde(rename = "history-capacity")]
    pub history_capacity: usize,

    /// Frames buffered per subscriber before it is dropped as lagging
    #[serde(rename = "subscriber-buffer")]
    pub subscriber_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// Transport endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address; port 0 lets the OS pick
    pub bind: String,

    /// Interval between keep-alive comment frames
    #[serde(rename = "keep-alive-secs")]
    pub keep_alive_secs: u64,

    /// Start the endpoint when the panel opens
    pub autostart: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:0".to_string(),
            keep_alive_secs: 15,
            autostart: true,
        }
    }
}

/// Host scripting bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Evaluator program that receives the script on stdin
    pub program: Option<String>,

    /// Extra arguments for the evaluator
    pub args: Vec<String>,

    /// Evaluation timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout_ms: 30_000,
        }
    }
}
