//! User configuration - `<config_dir>/orgmate/config.yml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "orgmate";
const CONFIG_FILE: &str = "config.yml";
const DATA_FILE: &str = "data.json";
const DEFAULT_EDITOR: &str = "vi";

/// Built-in command aliases
pub fn default_aliases() -> BTreeMap<String, String> {
    [
        ("ls", "tree -d 1 -f status -f progress"),
        ("restart", "set status new"),
        ("start", "set status active"),
        ("stop", "set status inactive"),
        ("finish", "set status done"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Settings read from the YAML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the task graph is stored
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// Editor command for notes, overrides `$EDITOR`
    #[serde(default)]
    pub editor: Option<String>,

    /// Aliases merged over the built-in ones
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Config {
    /// Default config location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load config from YAML file; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load config from the default location
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => {
                log::warn!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Data file: configured, else under the platform data dir
    pub fn data_file(&self) -> PathBuf {
        if let Some(path) = &self.data_file {
            return path.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join(DATA_FILE))
            .unwrap_or_else(|| PathBuf::from(DATA_FILE))
    }

    /// Editor command: configured, else `$VISUAL` / `$EDITOR`, else `vi`
    pub fn editor(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
    }

    /// Built-in aliases with the configured ones on top
    pub fn aliases(&self) -> BTreeMap<String, String> {
        let mut aliases = default_aliases();
        aliases.extend(self.aliases.clone());
        aliases
    }
}
