//! Configuration file support for the annotation engine.
//!
//! Host applications persist engine settings as JSON and hand the loaded
//! sections to the component constructors. Every field has a default, so a
//! partial (or missing) config file always yields a working engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_MEMORY_BUDGET, DEFAULT_PREFETCH_WINDOW, DEFAULT_PREFETCH_WORKERS};
use crate::detect::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DUPLICATE_IOU};
use crate::model::DEFAULT_MIN_BOX_SIZE;

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Engine configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Geometry editor settings
    #[serde(default)]
    pub editor: EditorConfig,

    /// Image cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Detection bridge settings
    #[serde(default)]
    pub detection: DetectionConfig,
}

/// Geometry editor section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Smallest box edge, in image pixels, a commit may produce
    #[serde(default = "default_min_box_size")]
    pub min_box_size: f64,
}

fn default_min_box_size() -> f64 {
    DEFAULT_MIN_BOX_SIZE
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_box_size: default_min_box_size(),
        }
    }
}

/// Image cache section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memory budget for decoded pixels, in bytes
    #[serde(default = "default_memory_budget")]
    pub memory_budget_bytes: usize,

    /// Number of background prefetch worker threads
    #[serde(default = "default_prefetch_workers")]
    pub prefetch_workers: usize,

    /// Neighbors prefetched on each side of the current image
    #[serde(default = "default_prefetch_window")]
    pub prefetch_window: usize,
}

fn default_memory_budget() -> usize {
    DEFAULT_MEMORY_BUDGET
}

fn default_prefetch_workers() -> usize {
    DEFAULT_PREFETCH_WORKERS
}

fn default_prefetch_window() -> usize {
    DEFAULT_PREFETCH_WINDOW
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: default_memory_budget(),
            prefetch_workers: default_prefetch_workers(),
            prefetch_window: default_prefetch_window(),
        }
    }
}

/// Detection bridge section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Proposals below this confidence are dropped before merging
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// IoU above which a same-class proposal counts as a duplicate;
    /// `None` disables duplicate suppression
    #[serde(default = "default_duplicate_iou")]
    pub duplicate_iou: Option<f64>,
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_duplicate_iou() -> Option<f64> {
    Some(DEFAULT_DUPLICATE_IOU)
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            duplicate_iou: default_duplicate_iou(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            editor: EditorConfig::default(),
            cache: CacheConfig::default(),
            detection: DetectionConfig::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "roadmark-config.json"
    }

    /// Get the default config file path for auto-load/save.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("roadmark").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home| {
                home.join(".config")
                    .join("roadmark")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match std::fs::read_to_string(&path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded configuration from {:?}", path);
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {:?}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(&path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
