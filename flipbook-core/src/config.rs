use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;
use tracing::debug;

use crate::flip::DEFAULT_FLIP_DURATION;
use crate::pagination::DEFAULT_SPREAD_MIN_WIDTH;

/// What happens to the zoom level when a page turn commits. Pan is reset in
/// both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnPolicy {
    #[default]
    KeepZoom,
    FitPage,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding `edu-NN.png` page images and an optional `handbook.toml`.
    pub book_dir: Option<PathBuf>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub flip_duration: Duration,
    /// Minimum display width in pixels for the two-page spread.
    pub spread_min_width: u32,
    pub turn_policy: TurnPolicy,
    /// TrueType/OpenType font used for certificate and pledge card text.
    pub font_path: Option<PathBuf>,
    /// Where generated images are written; defaults to the download folder.
    pub export_dir: Option<PathBuf>,
    /// Number of decoded page images kept in memory.
    pub cache_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            book_dir: None,
            flip_duration: DEFAULT_FLIP_DURATION,
            spread_min_width: DEFAULT_SPREAD_MIN_WIDTH,
            turn_policy: TurnPolicy::default(),
            font_path: None,
            export_dir: None,
            cache_pages: 12,
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }
}

/// Platform locations used by the reader.
#[derive(Debug, Clone)]
pub struct AppDirs {
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Written to when the export directory cannot be used.
    pub fallback_export_dir: PathBuf,
    pub download_dir: Option<PathBuf>,
}

impl AppDirs {
    pub fn resolve() -> Option<Self> {
        let project = ProjectDirs::from("org", "flipbook", "flipbook")?;
        let download_dir =
            UserDirs::new().and_then(|dirs| dirs.download_dir().map(Path::to_path_buf));
        Some(Self::from_project(&project, download_dir))
    }

    pub fn from_project(project: &ProjectDirs, download_dir: Option<PathBuf>) -> Self {
        let data = project.data_local_dir();
        Self {
            config_file: project.config_dir().join("config.toml"),
            state_dir: data.join("state"),
            log_dir: data.join("logs"),
            fallback_export_dir: data.join("exports"),
            download_dir,
        }
    }

    /// Preferred export directory: configured, then the download folder.
    pub fn export_dir(&self, config: &Config) -> PathBuf {
        config
            .export_dir
            .clone()
            .or_else(|| self.download_dir.clone())
            .unwrap_or_else(|| self.fallback_export_dir.clone())
    }
}
