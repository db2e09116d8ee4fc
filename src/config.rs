//! Runtime configuration: where data lives and which backend stores it.
//!
//! Sources, lowest precedence first: built-in defaults, `config.toml` in the
//! platform config directory, `POMOVATE_*` environment variables, and
//! command-line flags (applied by the caller).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::persistence::BackendKind;

pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_DATA_DIR: &str = "POMOVATE_DATA_DIR";
pub const ENV_BACKEND: &str = "POMOVATE_BACKEND";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid {name}: {message}")]
    Env { name: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// `None` lets the backend be detected at startup.
    pub backend: Option<BackendKind>,
    /// Desktop notifications when a countdown finishes.
    pub notifications: bool,
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    backend: Option<BackendKind>,
    notifications: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: None,
            notifications: true,
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(raw)?;
        let defaults = Self::default();
        Ok(Self {
            data_dir: file.data_dir.unwrap_or(defaults.data_dir),
            backend: file.backend,
            notifications: file.notifications.unwrap_or(defaults.notifications),
        })
    }

    /// Applies `POMOVATE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_BACKEND).filter(|b| !b.is_empty()) {
            let kind = raw.parse::<BackendKind>().map_err(|message| ConfigError::Env {
                name: ENV_BACKEND,
                message,
            })?;
            self.backend = Some(kind);
        }
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "pomovate", "Pomovate")
}

fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
