use std::path::Path;

use config as cfg;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::filter::PathFilter;
use crate::sequence::SequenceGenerator;

/// Prefix of environment overrides, e.g. `CHANGEFLOW__LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "CHANGEFLOW";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Top-level settings for an observation session.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ObserverSettings {
    #[serde(default)]
    pub observation: ObservationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shape of the observation tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationConfig {
    /// Root-relative dotted paths to observe; absent observes everything.
    #[serde(default)]
    pub tracked_paths: Option<Vec<String>>,

    /// Break cycles through arbitrary properties by treating a re-encountered
    /// ancestor as a leaf.
    #[serde(default = "default_detect_cycles")]
    pub detect_cycles: bool,

    /// First sequence number handed out.
    #[serde(default = "default_initial_sequence")]
    pub initial_sequence: u64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            tracked_paths: None,
            detect_cycles: default_detect_cycles(),
            initial_sequence: default_initial_sequence(),
        }
    }
}

impl ObservationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_sequence == 0 {
            return Err(ConfigError::ValidationError(
                "initial_sequence must be at least 1".to_string(),
            ));
        }
        if let Some(paths) = &self.tracked_paths {
            if let Some(bad) = paths
                .iter()
                .find(|p| p.split('.').any(|seg| seg.is_empty()))
            {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid tracked path: {:?}",
                    bad
                )));
            }
        }
        Ok(())
    }

    pub fn path_filter(&self) -> crate::Result<Option<PathFilter>> {
        self.tracked_paths
            .as_ref()
            .map(|paths| PathFilter::new(paths.iter().cloned()))
            .transpose()
    }

    pub fn sequence_generator(&self) -> SequenceGenerator {
        SequenceGenerator::starting_at(self.initial_sequence)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_detect_cycles() -> bool {
    true
}
fn default_initial_sequence() -> u64 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl ObserverSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: ObserverSettings =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        let settings = Self::from_toml_str(&content)?;
        info!("Loaded observer settings from {:?}", path);
        Ok(settings)
    }

    /// Layers `default.toml`, then `local.toml` from `config_dir`, then
    /// `CHANGEFLOW__*` environment variables. Missing files are skipped.
    pub fn load_from_sources(config_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_layered(config_dir, ENV_PREFIX)
    }

    fn load_layered(config_dir: &Path, env_prefix: &str) -> Result<Self, ConfigError> {
        let settings: ObserverSettings = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("observation.tracked_paths"),
            )
            .build()
            .map_err(|e| ConfigError::ReadError(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        settings.validate()?;
        debug!("Observer settings resolved from {:?}", config_dir);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.observation.validate()?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
