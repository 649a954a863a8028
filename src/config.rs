//! Run configuration for the cliptab binaries.
//!
//! Settings live in a `cliptab.toml` next to the invocation; a missing file
//! yields defaults, and command-line flags override whatever was loaded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::DEFAULT_WORKER_CAP;

/// Default filename used to store the run configuration.
pub const CONFIG_FILE_NAME: &str = "cliptab.toml";
/// Upper bound accepted for the worker cap.
pub const MAX_WORKER_CAP: usize = 512;

/// Errors that may occur while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for [`RunConfig`].
    #[error("Failed to parse config {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize configuration for saving.
    #[error("Failed to serialize config: {0}")]
    SerializeToml(toml::ser::Error),
    /// Failed to create the configuration directory.
    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the configuration file.
    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Delimited metadata table describing the expected clips.
    pub metadata_path: PathBuf,
    /// Root of the per-clip directory layout.
    pub clips_root: PathBuf,
    /// Root of the per-episode directory layout.
    pub originals_root: PathBuf,
    /// Root of the arbitrary tree indexed by the augmentation mode.
    pub data_root: PathBuf,
    /// Maximum concurrently running decode workers.
    pub worker_cap: usize,
    /// Directory that plot PNGs are written into.
    pub plot_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            metadata_path: PathBuf::from("labels.csv"),
            clips_root: PathBuf::from("clips_audio"),
            originals_root: PathBuf::from("original_audio"),
            data_root: PathBuf::from("data"),
            worker_cap: DEFAULT_WORKER_CAP,
            plot_dir: PathBuf::from("plots"),
        }
    }
}

impl RunConfig {
    /// Clamp out-of-range values after deserialization.
    pub fn normalized(mut self) -> Self {
        self.worker_cap = self.worker_cap.clamp(1, MAX_WORKER_CAP);
        self
    }
}

/// Load configuration from `path`, returning defaults if it is absent.
pub fn load_or_default(path: &Path) -> Result<RunConfig, ConfigError> {
    if !path.exists() {
        return Ok(RunConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<RunConfig>(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
        .map(RunConfig::normalized)
}

/// Persist configuration to `path`, creating parent directories as needed.
pub fn save(config: &RunConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(ConfigError::SerializeToml)?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
