//! Persistent store - one JSON document of named values
//!
//! The shell keeps the root task graph under `"root"` and the alias table
//! under `"aliases"`. Values are opaque to the store.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Key of the task graph in the store
pub const ROOT_KEY: &str = "root";
/// Key of the alias table in the store
pub const ALIASES_KEY: &str = "aliases";

/// Named values backed by a single JSON file
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Store {
    /// Open the store at `path`; a missing file gives an empty store
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read store {}", path.display()))?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse store {}", path.display()))?
            }
        } else {
            log::info!("No store at {}, starting fresh", path.display());
            Map::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// File backing the store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deserialize the value under `key`, `None` when absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone())
                    .with_context(|| format!("Malformed '{}' in {}", key, self.path.display()))
            })
            .transpose()
    }

    /// Serialize `value` under `key`; written on the next save
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Drop `key`; true if it was present
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Forget every stored value
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Write the store to disk atomically (temp file + rename)
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let json = serde_json::to_string_pretty(&self.values)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write store {}", self.path.display()))?;

        log::info!("Saved store to {}", self.path.display());
        Ok(())
    }
}
