// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration.
//!
//! Loaded from TOML; every field has a default so an absent or empty file yields a working
//! configuration for a stock Linux host.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CXL_MAILBOX_CONFIG";
/// Environment variable carrying a log priority (`err`/`info`/`debug` or a syslog number).
pub const LOG_ENV: &str = "CXL_LOG";
/// Configuration file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cxl/mailbox.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML for [`Config`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
    /// A log level could not be understood.
    #[error("invalid log level {0:?}")]
    LogLevel(String),
}

/// Runtime configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Registry root holding `memN` entries.
    pub sysfs_root: PathBuf,
    /// Directory holding `memN` device nodes.
    pub dev_root: PathBuf,
    /// Log level name (`error`, `warn`, `info`, `debug`, `trace`, `off`).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/bus/cxl/devices"),
            dev_root: PathBuf::from("/dev/cxl"),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)
            .map_err(|source| ConfigError::Parse { path: origin.to_path_buf(), source })?;
        config.level_filter()?;
        Ok(config)
    }

    /// Loads configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&text, path)
    }

    /// Loads `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text, path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("config: {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// Resolves configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_vars(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `get`, which stands in for `std::env::var`.
    pub fn from_env_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = get(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path {
            Some(path) => Self::load(&path)?,
            None => Self::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
        };
        if let Some(priority) = get(LOG_ENV) {
            config.log_level = parse_log_priority(&priority)?.to_string().to_lowercase();
        }
        Ok(config)
    }

    /// Log level as a [`LevelFilter`].
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level.parse().map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// Devnode path for `name` under [`Config::dev_root`].
    pub fn devnode(&self, name: &str) -> PathBuf {
        self.dev_root.join(name)
    }
}

/// Parses a `CXL_LOG` style priority: `err`, `info`, `debug`, or a syslog number.
pub fn parse_log_priority(value: &str) -> Result<LevelFilter, ConfigError> {
    let value = value.trim();
    let level = match value {
        "err" | "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        _ => match value.parse::<u8>() {
            Ok(0..=3) => LevelFilter::Error,
            Ok(4 | 5) => LevelFilter::Warn,
            Ok(6) => LevelFilter::Info,
            Ok(7) => LevelFilter::Debug,
            _ => return Err(ConfigError::LogLevel(value.to_string())),
        },
    };
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("", Path::new("inline")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn fields_override_defaults() {
        let text = "sysfs_root = \"/tmp/sys\"\nlog_level = \"debug\"\n";
        let config = Config::from_toml(text, Path::new("inline")).unwrap();
        assert_eq!(config.sysfs_root, PathBuf::from("/tmp/sys"));
        assert_eq!(config.dev_root, PathBuf::from("/dev/cxl"));
        assert_eq!(config.level_filter().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn unknown_keys_and_bad_levels_are_rejected() {
        let err = Config::from_toml("bogus = 1", Path::new("inline")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        let err = Config::from_toml("log_level = \"loud\"", Path::new("inline")).unwrap_err();
        assert!(matches!(err, ConfigError::LogLevel(_)));
    }

    #[test]
    fn env_points_at_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mailbox.toml");
        fs::write(&path, "dev_root = \"/tmp/dev\"\n").unwrap();
        let vars: HashMap<&str, String> = [
            (CONFIG_ENV, path.display().to_string()),
            (LOG_ENV, "7".to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_env_vars(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.dev_root, PathBuf::from("/tmp/dev"));
        assert_eq!(config.level_filter().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Read { .. })));
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }

    #[test]
    fn syslog_priorities() {
        assert_eq!(parse_log_priority("err").unwrap(), LevelFilter::Error);
        assert_eq!(parse_log_priority("3").unwrap(), LevelFilter::Error);
        assert_eq!(parse_log_priority("6").unwrap(), LevelFilter::Info);
        assert_eq!(parse_log_priority(" debug ").unwrap(), LevelFilter::Debug);
        assert!(parse_log_priority("9").is_err());
    }
}
