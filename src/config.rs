// ⚙️ Configuration
//
// Priority (highest first):
// 1. Command-line flags (applied by the binaries)
// 2. Environment: TRACKER_DATABASE, TRACKER_METADATA, TRACKER_BIND, TRACKER_LOG
// 3. TOML file
// 4. Built-in defaults

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATABASE: &str = "TRACKER_DATABASE";
pub const ENV_METADATA: &str = "TRACKER_METADATA";
pub const ENV_BIND: &str = "TRACKER_BIND";
pub const ENV_LOG: &str = "TRACKER_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub database_path: PathBuf,
    pub metadata_path: PathBuf,
    pub bind_address: String,
    /// tracing EnvFilter directive, e.g. `info,tracker_import=debug`
    pub log_filter: String,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        ImporterConfig {
            database_path: PathBuf::from("tracker.db"),
            metadata_path: PathBuf::from("metadata.json"),
            bind_address: "127.0.0.1:3000".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl ImporterConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TrackerError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Read the TOML file if one is given, then apply environment overrides.
    /// A missing file is an error; no file at all means defaults. Silent: it
    /// runs before the subscriber that would print anything exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    let path = path.display();
                    TrackerError::Config(format!("Failed to read config file {}: {}", path, e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };

        Ok(config.apply_overrides(|key| std::env::var(key).ok()))
    }

    /// Overlay values from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup(ENV_DATABASE) {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_METADATA) {
            self.metadata_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_BIND) {
            self.bind_address = v;
        }
        if let Some(v) = lookup(ENV_LOG) {
            self.log_filter = v;
        }
        self
    }
}
