//! Service configuration.
//!
//! Layers, later wins: built-in defaults, `/usr/local/etc/tickler.toml`,
//! `./configs/tickler.toml`, an explicit `--config` file, then flags and
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tickler_scheduler::{DEFAULT_WORK_DURATION, SchedulerConfig};

/// File name looked up in each default config directory.
pub const CONFIG_FILE_NAME: &str = "tickler.toml";

/// Default config directories, lowest priority first.
const CONFIG_DIRS: [&str; 2] = ["/usr/local/etc", "./configs"];

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A config file is not valid TOML or has the wrong shape.
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The merged configuration could not be built.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File that receives a copy of the log output. Empty disables it.
    pub log_file: PathBuf,
    /// Minimum log level when `RUST_LOG` is unset.
    pub log_level: String,
    pub rest_api: RestApiConfig,
    pub scheduler: SchedulerSection,
}

/// Where the REST API listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Simulated work time per job, in milliseconds.
    pub work_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("tickler.log"),
            log_level: "info".to_string(),
            rest_api: RestApiConfig::default(),
            scheduler: SchedulerSection::default(),
        }
    }
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            work_duration_ms: DEFAULT_WORK_DURATION.as_millis() as u64,
        }
    }
}

impl RestApiConfig {
    /// `host:port` for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub work_duration_ms: Option<u64>,
}

impl Config {
    /// Load the default config files plus an optional explicit one, then apply
    /// overrides.
    pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut config = Self::from_files(&default_config_paths(), explicit)?;
        config.apply(overrides);
        Ok(config)
    }

    /// Merge `optional` files (skipped when missing) and then `required`
    /// (which must exist) over the defaults.
    pub fn from_files(optional: &[PathBuf], required: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::try_from(Config::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for path in optional {
            if path.is_file() {
                merge_tables(&mut merged, read_table(path)?);
            }
        }
        if let Some(path) = required {
            merge_tables(&mut merged, read_table(path)?);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Invalid(e.to_string()))
    }

    /// Apply command-line and environment overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.rest_api.host = host;
        }
        if let Some(port) = overrides.port {
            self.rest_api.port = port;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(file) = overrides.log_file {
            self.log_file = file;
        }
        if let Some(ms) = overrides.work_duration_ms {
            self.scheduler.work_duration_ms = ms;
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            work_duration: Duration::from_millis(self.scheduler.work_duration_ms),
        }
    }

    /// Log file path, or `None` when file logging is disabled.
    pub fn log_file(&self) -> Option<&Path> {
        if self.log_file.as_os_str().is_empty() {
            None
        } else {
            Some(&self.log_file)
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Default config file locations, lowest priority first.
pub fn default_config_paths() -> Vec<PathBuf> {
    CONFIG_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(CONFIG_FILE_NAME))
        .collect()
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    contents.parse::<toml::Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Recursively overlay `overlay` onto `base`; nested tables merge key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
