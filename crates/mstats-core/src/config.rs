use crate::error::{Result, StatsError};
use crate::interval::{OperationInterval, VALID_OPERATION_INTERVALS};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// MaintenanceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Operation interval length in minutes. Must divide 60.
    #[serde(default = "default_operation_interval")]
    pub operation_interval: u32,
}

fn default_operation_interval() -> u32 {
    OperationInterval::DEFAULT.minutes()
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            operation_interval: default_operation_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; relative paths resolve against the project root.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DB_FILE)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            maintenance: MaintenanceConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn with_interval(interval: OperationInterval) -> Self {
        Self {
            maintenance: MaintenanceConfig {
                operation_interval: interval.minutes(),
            },
            ..Self::default()
        }
    }

    /// The validated operation interval.
    pub fn operation_interval(&self) -> Result<OperationInterval> {
        OperationInterval::new(self.maintenance.operation_interval)
    }

    pub fn db_path(&self, root: &Path) -> PathBuf {
        paths::resolve_db_path(root, &self.storage.path)
    }

    /// Parse the config under `root` without validating it.
    pub fn read(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(StatsError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load and validate the config under `root`.
    ///
    /// An interval that does not divide 60 is rejected here so that no
    /// maintenance cycle ever runs with it.
    pub fn load(root: &Path) -> Result<Self> {
        let cfg = Self::read(root)?;
        cfg.operation_interval()?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // 1. Operation interval must divide the hour
        let minutes = self.maintenance.operation_interval;
        if let Err(e) = self.operation_interval() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "{e}; valid values: {}",
                    VALID_OPERATION_INTERVALS
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        } else if minutes < 5 {
            // 2. Very short intervals mean many intermediate rows per hour
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "operation_interval={minutes} (<5 minutes produces {} intermediate rows per hour)",
                    60 / minutes
                ),
            });
        }

        // 3. Storage path
        if self.storage.path.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "storage.path is empty".to_string(),
            });
        }

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("unknown config version {}", self.version),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
