//! Service configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists or it cannot be parsed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory scanned for plugin manifests.
    pub dsl_folder: PathBuf,
    /// Base folder scripts are resolved against.
    pub script_folder: PathBuf,
    /// Script to run for every event. Empty means "pick by event kind".
    pub script_file: String,
    /// Script for unrecognised events when no override is set.
    pub default_script: String,
    pub script_extension: String,
    /// Abort scripts running longer than this. Unset means no limit.
    pub script_timeout_ms: Option<u64>,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Rolling daily log files go here when set.
    pub directory: Option<PathBuf>,
    pub json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dsl_folder: PathBuf::from("."),
            script_folder: PathBuf::from("."),
            script_file: String::new(),
            default_script: "default.rhai".to_string(),
            script_extension: alertdsl_dsl::resolver::DEFAULT_SCRIPT_EXTENSION.to_string(),
            script_timeout_ms: None,
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn script_timeout(&self) -> Option<Duration> {
        self.script_timeout_ms.map(Duration::from_millis)
    }

    /// Explicit script for an event: the configured override, or the default
    /// script when the event is unknown.
    pub fn script_override(&self, unknown_event: bool) -> Option<&str> {
        if !self.script_file.is_empty() {
            Some(&self.script_file)
        } else if unknown_event {
            Some(&self.default_script)
        } else {
            None
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
