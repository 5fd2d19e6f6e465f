//! Importer configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or no
//! file at all when the default path is used) yields a working configuration
//! rooted at `./data`.
//!
//! ```toml
//! backup = true
//!
//! [directories]
//! root = "/var/lib/hlz"
//!
//! [directories.overrides]
//! label-orders = "/mnt/orders"
//!
//! [versions.defaults]
//! transactions = "017"
//!
//! [versions.companies.ACME]
//! transactions = "016"
//!
//! [integrity]
//! hash_extension = "sha256"
//! grace_seconds = 3600
//! message_retry_attempts = 3
//! message_retry_delay_ms = 2000
//!
//! [retention]
//! days = 90
//!
//! [workers]
//! max_concurrent = 4
//! ```

use crate::core::lifecycle::DirectoryLayout;
use crate::core::version::VersionTable;
use crate::types::{ArtifactKind, ImportError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "HLZ_IMPORTER_CONFIG";

/// Config path used when neither the CLI nor the environment names one
pub const DEFAULT_CONFIG_PATH: &str = "hlz-importer.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub directories: DirectoryConfig,
    pub versions: VersionConfig,
    pub integrity: IntegrityConfig,
    pub retention: RetentionConfig,
    pub workers: WorkerSettings,
    /// Copy every file to `backup` before its terminal move
    pub backup: bool,
}

/// Where the stage directories live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Each kind gets `<root>/<kind>/<stage>`
    pub root: PathBuf,
    /// Per-kind root replacing `<root>/<kind>`
    pub overrides: BTreeMap<ArtifactKind, PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            overrides: BTreeMap::new(),
        }
    }
}

/// Expected schema versions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VersionConfig {
    pub defaults: BTreeMap<ArtifactKind, String>,
    pub companies: BTreeMap<String, BTreeMap<ArtifactKind, String>>,
}

/// Integrity guard settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    pub hash_extension: String,
    /// How long a polled file may wait for its companion before it fails
    pub grace_seconds: u64,
    /// Integrity attempts on the message-driven path
    pub message_retry_attempts: u32,
    pub message_retry_delay_ms: u64,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            hash_extension: "sha256".to_string(),
            grace_seconds: 3600,
            message_retry_attempts: 3,
            message_retry_delay_ms: 2000,
        }
    }
}

impl IntegrityConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.message_retry_delay_ms)
    }
}

/// Dedup retention window
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { days: 90 }
    }
}

/// Worker settings for the concurrent strategy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Files processed at once; defaults to the CPU count
    pub max_concurrent: Option<usize>,
}

impl Config {
    /// Load configuration
    ///
    /// Looks for the file in this order:
    /// 1. `path`, when given
    /// 2. the path in `HLZ_IMPORTER_CONFIG`
    /// 3. `./hlz-importer.toml`, falling back to defaults when absent
    pub fn load(path: Option<&Path>) -> Result<Self, ImportError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config_path = match explicit {
            Some(p) => p,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    log::info!("No {} found, using default configuration", DEFAULT_CONFIG_PATH);
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&config_path).map_err(|e| {
            ImportError::config(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let config = Self::from_toml(&text)?;
        log::info!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ImportError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| ImportError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ImportError> {
        if self.integrity.hash_extension.trim().is_empty() {
            return Err(ImportError::config("integrity.hash_extension must not be empty"));
        }
        if self.retention.days <= 0 {
            return Err(ImportError::config(format!(
                "retention.days must be positive, got {}",
                self.retention.days
            )));
        }
        Ok(())
    }

    /// Stage directories for every artifact kind
    pub fn layout(&self) -> DirectoryLayout {
        DirectoryLayout::new(&self.directories.root, &self.directories.overrides)
    }

    /// Expected versions per (company, kind)
    pub fn version_table(&self) -> VersionTable {
        VersionTable::from_config(&self.versions)
    }
}
