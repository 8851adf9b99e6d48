use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DRILLSCOPE_DIR_NAME: &str = ".drillscope";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const MAX_MEASURES_PER_COLUMN: u32 = 200;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DrillscopeConfig {
    #[serde(default)]
    pub drilldown: DrilldownConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrilldownConfig {
    #[serde(default = "default_max_measures")]
    pub max_measures: u32,
}

impl Default for DrilldownConfig {
    fn default() -> Self {
        Self {
            max_measures: default_max_measures(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn drillscope_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(DRILLSCOPE_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    drillscope_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<DrillscopeConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(DrillscopeConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: DrillscopeConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<DrillscopeConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(drillscope_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = DrillscopeConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

/// Non-fatal problems in a loaded config. Values are still usable since
/// loading already normalized them.
pub fn validate_config(config: &DrillscopeConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.drilldown.max_measures < MAX_MEASURES_PER_COLUMN {
        warnings.push(ConfigWarning {
            code: "drilldown_page_reduced",
            message: format!(
                "[drilldown].max_measures={} lists fewer than the default {} rows per column",
                config.drilldown.max_measures, MAX_MEASURES_PER_COLUMN
            ),
        });
    }

    if config.store.busy_timeout_ms == 0 {
        warnings.push(ConfigWarning {
            code: "store_busy_timeout_disabled",
            message: "[store].busy_timeout_ms=0 fails reads at once while the database is locked"
                .to_owned(),
        });
    }

    warnings
}

fn default_max_measures() -> u32 {
    MAX_MEASURES_PER_COLUMN
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

fn normalize_config(mut config: DrillscopeConfig) -> DrillscopeConfig {
    config.drilldown.max_measures = config
        .drilldown
        .max_measures
        .clamp(1, MAX_MEASURES_PER_COLUMN);

    let filter = config.logging.filter.trim();
    if filter.is_empty() {
        config.logging.filter = default_log_filter();
    } else {
        config.logging.filter = filter.to_owned();
    }

    config
}
