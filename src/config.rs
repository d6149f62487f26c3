//! Configuration management for the definition workbench
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (workbench.toml)
//! - Environment variables (WORKBENCH__*)
//!
//! ## Example config file (workbench.toml):
//! ```toml
//! [history]
//! coalesce_window_ms = 750
//! max_depth = 256
//!
//! [events]
//! channel_capacity = 1024
//!
//! [validation]
//! warn_unknown_fields = true
//! suggest_field_names = true
//!
//! [storage]
//! definitions_dir = "content/definitions"
//! schemas_dir = "content/schemas"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the workbench
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkbenchConfig {
    /// Undo/redo settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Event bus settings
    #[serde(default)]
    pub events: EventsConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Undo/redo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Window in which repeated text edits to one field merge into a single
    /// undo step; 0 disables merging
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,

    /// Maximum undo steps kept per working copy
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Buffered events per channel subscriber before new events are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Warn about fields the schema does not declare
    #[serde(default = "default_true")]
    pub warn_unknown_fields: bool,

    /// Suggest the closest declared field name for unknown fields
    #[serde(default = "default_true")]
    pub suggest_field_names: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of stored definitions (one JSON file per id)
    #[serde(default)]
    pub definitions_dir: Option<PathBuf>,

    /// Directory of category schema files
    #[serde(default)]
    pub schemas_dir: Option<PathBuf>,
}

// Default value functions
fn default_coalesce_window_ms() -> u64 {
    750
}

fn default_max_depth() -> usize {
    256
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: default_coalesce_window_ms(),
            max_depth: default_max_depth(),
        }
    }
}

impl HistoryConfig {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            warn_unknown_fields: true,
            suggest_field_names: true,
        }
    }
}

impl WorkbenchConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "workbench.toml",
            ".workbench.toml",
            "config/workbench.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "definition-workbench", "workbench") {
            let xdg_config = config_dir.config_dir().join("workbench.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (WORKBENCH__*)
        builder = builder.add_source(
            Environment::with_prefix("WORKBENCH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
