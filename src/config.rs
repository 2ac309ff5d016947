//! File configuration for CLI defaults.
//!
//! An optional TOML file supplies defaults that explicit CLI flags override.
//! Unknown keys are rejected so typos surface instead of being ignored.
//!
//! ```toml
//! listing_url = "https://pokemondb.net/pokedex/all"
//! data_dir = "data"
//! concurrency = 4
//! rate_limit_ms = 1000
//! check_robots = true
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Default creature listing page.
pub const DEFAULT_LISTING_URL: &str = "https://pokemondb.net/pokedex/all";
/// Default ability listing page.
pub const DEFAULT_ABILITY_LISTING_URL: &str = "https://pokemondb.net/ability";
/// Default directory for JSONL streams.
pub const DEFAULT_DATA_DIR: &str = "data";
/// Default database file name inside the data directory.
pub const DEFAULT_DB_FILE: &str = "pokedex.db";

const CONFIG_DIR_NAME: &str = "pokedex";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        expected: &'static str,
    },
}

/// TOML-backed defaults. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listing_url: Option<String>,
    /// Ability listing page; crawled unless abilities are disabled.
    pub ability_listing_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    /// Concurrent page fetches (1..=100).
    pub concurrency: Option<usize>,
    /// Per-domain delay between requests in milliseconds (0..=60000).
    pub rate_limit_ms: Option<u64>,
    /// Retries after the first attempt (0..=10).
    pub max_retries: Option<u32>,
    pub check_robots: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parses TOML text without validating ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            return Err(ConfigError::OutOfRange {
                field: "concurrency",
                value: u64::try_from(concurrency).unwrap_or(u64::MAX),
                expected: "1..=100",
            });
        }
        if let Some(rate_limit_ms) = self.rate_limit_ms
            && rate_limit_ms > 60_000
        {
            return Err(ConfigError::OutOfRange {
                field: "rate_limit_ms",
                value: rate_limit_ms,
                expected: "0..=60000",
            });
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            return Err(ConfigError::OutOfRange {
                field: "max_retries",
                value: u64::from(max_retries),
                expected: "0..=10",
            });
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }

    /// Data directory, falling back to [`DEFAULT_DATA_DIR`].
    #[must_use]
    pub fn data_dir_or_default(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    match value {
        Some(value) if !(1..=3600).contains(&value) => Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "1..=3600",
        }),
        _ => Ok(()),
    }
}

/// Default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/pokedex/config.toml`
/// 2. `$HOME/.config/pokedex/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Reads and validates the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, parsed, or validated.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::from_toml(&text, path)?;
    config.validate()?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Loads the explicit config file, or the default one if it exists.
///
/// An explicit path must exist; a missing default file yields the empty
/// config.
///
/// # Errors
///
/// Returns [`ConfigError`] if a config file is present but invalid.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}
