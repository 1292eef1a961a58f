//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `pinhub.toml` in the working directory unless `--config`
//! names another file. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values, and
//! command-line flags over both.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::backend::BackendKind;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "pinhub.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device and routine store.
    pub store: StoreConfig,
    /// Pin backend selection.
    pub backend: BackendConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Where devices and routines are persisted.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON document.
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `path` (or `pinhub.toml` when `None`), then
    /// apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed, if an explicitly named
    /// file is missing, or if an override has an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path, true)?,
            None => Self::from_file(Path::new(DEFAULT_CONFIG_FILE), false)?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = var("PINHUB_STORE") {
            self.store.path = PathBuf::from(val);
        }
        if let Some(val) = var("PINHUB_BACKEND") {
            self.backend.kind = val.parse().map_err(ConfigError::Validation)?;
        }
        if let Some(val) = var("PINHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("store path must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pin_config.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.store.path, PathBuf::from("pin_config.json"));
        assert_eq!(config.backend.kind, BackendKind::Auto);
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend.kind, BackendKind::Auto);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [store]
            path = '/var/lib/pinhub/pin_config.json'

            [backend]
            kind = 'pinctrl'

            [logging]
            filter = 'pinhub=debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/var/lib/pinhub/pin_config.json"));
        assert_eq!(config.backend.kind, BackendKind::Pinctrl);
        assert_eq!(config.logging.filter, "pinhub=debug");
    }

    #[test]
    fn should_reject_unknown_backend_in_toml() {
        let result: Result<Config, _> = toml::from_str("[backend]\nkind = 'gpiozero'");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_default_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent.toml"), false).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Auto);
    }

    #[test]
    fn should_fail_when_named_file_not_found() {
        assert!(matches!(
            Config::from_file(Path::new("nonexistent.toml"), true),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("PINHUB_STORE", "/tmp/pins.json"),
                ("PINHUB_BACKEND", "virtual"),
                ("PINHUB_LOG", "debug"),
            ]))
            .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/pins.json"));
        assert_eq!(config.backend.kind, BackendKind::Virtual);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_prefer_rust_log_over_pinhub_log() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[("PINHUB_LOG", "debug"), ("RUST_LOG", "trace")]))
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_invalid_backend_override() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(env(&[("PINHUB_BACKEND", "gpiozero")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_empty_store_path() {
        let mut config = Config::default();
        config.store.path = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
