//! Local preference store
//!
//! A small JSON key-value file holding the user's credential and the
//! include-host-info toggle. Read on startup, written only on explicit save.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the preference file
pub fn default_prefs_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("panelhub")
        .join("prefs.json")
}

/// Persisted user preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "openai_api_key", default)]
    pub api_key: String,

    #[serde(default)]
    pub include_host_info: bool,

    #[serde(skip)]
    path: PathBuf,
}

impl Preferences {
    /// Load preferences from `path`, falling back to defaults when absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "load: called");

        if !path.exists() {
            debug!("load: no prefs file, using defaults");
            return Ok(Self {
                path: path.to_path_buf(),
                ..Default::default()
            });
        }

        let content = fs::read_to_string(path).context(format!("Failed to read prefs from {}", path.display()))?;
        let mut prefs: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_json::from_str(&content).context(format!("Failed to parse prefs from {}", path.display()))?
        };
        prefs.path = path.to_path_buf();
        Ok(prefs)
    }

    /// Write preferences back to their file
    pub fn save(&self) -> Result<()> {
        debug!(path = %self.path.display(), "save: called");
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content).context(format!("Failed to write prefs to {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// "set" or "unset", never the credential itself
    pub fn api_key_status(&self) -> &'static str {
        if self.api_key.trim().is_empty() { "unset" } else { "set" }
    }

    /// Stored credential if non-empty, else the named environment variable
    pub fn resolve_api_key(&self, env_var: &str) -> Option<String> {
        let stored = self.api_key.trim();
        if !stored.is_empty() {
            debug!("resolve_api_key: using stored key");
            return Some(stored.to_string());
        }
        std::env::var(env_var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
