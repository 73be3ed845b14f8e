//! Platform configuration.
//!
//! Settings load from a TOML file when one exists and fall back to
//! defaults otherwise. The file is intentionally small: pool sizing,
//! the output root for generated applications, and the queue retention
//! windows.
//!
//! # Configuration File Format
//!
//! ```toml
//! [pipeline]
//! pool_size = 2
//! output_root = "generated"
//!
//! [retention]
//! completed_hours = 1
//! failed_days = 7
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::queue::RetentionPolicy;

/// Pipeline execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent pipeline workers.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Root directory under which per-run output directories are created.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            output_root: default_output_root(),
        }
    }
}

fn default_pool_size() -> usize {
    2
}

fn default_output_root() -> PathBuf {
    PathBuf::from("generated")
}

/// Queue retention settings, in coarse human units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_completed_hours")]
    pub completed_hours: i64,
    #[serde(default = "default_failed_days")]
    pub failed_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            completed_hours: default_completed_hours(),
            failed_days: default_failed_days(),
        }
    }
}

fn default_completed_hours() -> i64 {
    1
}

fn default_failed_days() -> i64 {
    7
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            completed: Duration::hours(self.completed_hours),
            failed: Duration::days(self.failed_days),
        }
    }
}

/// Top-level platform configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl PlatformConfig {
    /// Load configuration from `path`, or defaults if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.pipeline.pool_size > 0, "pool_size must be at least 1");
        anyhow::ensure!(
            self.retention.completed_hours > 0 && self.retention.failed_days > 0,
            "retention windows must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = PlatformConfig::load(&dir.path().join("appfab.toml")).unwrap();
        assert_eq!(config.pipeline.pool_size, 2);
        assert_eq!(config.pipeline.output_root, PathBuf::from("generated"));
        assert_eq!(config.retention.completed_hours, 1);
        assert_eq!(config.retention.failed_days, 7);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appfab.toml");
        fs::write(&path, "[pipeline]\npool_size = 4\n").unwrap();
        let config = PlatformConfig::load(&path).unwrap();
        assert_eq!(config.pipeline.pool_size, 4);
        assert_eq!(config.retention.failed_days, 7);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appfab.toml");
        fs::write(&path, "[pipeline]\npool_size = 0\n").unwrap();
        let err = PlatformConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn retention_config_maps_to_policy() {
        let config = RetentionConfig {
            completed_hours: 2,
            failed_days: 14,
        };
        let policy = config.policy();
        assert_eq!(policy.completed, Duration::hours(2));
        assert_eq!(policy.failed, Duration::days(14));
    }
}
