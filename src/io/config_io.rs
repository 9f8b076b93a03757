use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::{Config, PatternKind, ScanRules};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {kind}: {source}")]
    InvalidPattern {
        kind: PatternKind,
        source: regex::Error,
    },
}

/// Config file location, respecting XDG_CONFIG_HOME
pub fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".config"));
    config_dir.join("notekeeper").join("config.toml")
}

/// Data directory (store, drafts), respecting XDG_DATA_HOME
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".local").join("share"))
        .join("notekeeper")
}

/// Default store file
pub fn store_path() -> PathBuf {
    data_dir().join("store.json")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Read the config from `path`. A missing file gives the defaults.
pub fn read_config_from(path: &Path) -> Result<Config, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Compile the scan patterns, naming the one that failed.
pub fn scan_rules(config: &Config) -> Result<ScanRules, ConfigError> {
    ScanRules::compile(&config.scan)
        .map_err(|(kind, source)| ConfigError::InvalidPattern { kind, source })
}
