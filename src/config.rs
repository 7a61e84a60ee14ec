//! Runtime configuration loaded from TOML.
//!
//! Missing files and missing keys fall back to defaults, so the demo runs
//! without any configuration at all. A file that exists but does not parse is
//! an error.

use crate::controller::ManagerConfig;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = "padsession";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub manager: ManagerConfig,
    pub poll: PollConfig,
}

/// Settings for the frame loop of the demo binary.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between two frames in milliseconds
    pub interval_ms: u64,
    /// Log every just-pressed button
    pub log_transitions: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 16,
            log_transitions: true,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/padsession/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        Self::parse(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Invalid configuration: {}", e))
    }

    /// Loads the file at [`Config::default_path`] or returns defaults if there is none.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            Some(path) => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                debug!("No configuration directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }
}
