//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, the global file
//! `$XDG_CONFIG_HOME/coldset/config.toml`, an explicit `--config` file and
//! `COLDSET__SECTION__KEY` environment variables, in increasing precedence.

mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::BackupError;
use crate::logging::LoggingConfig;
use crate::retry::RetryPolicy;
use crate::seal::SealPolicy;
use crate::store::RestoreTier;
use crate::types::{ByteSize, MIB};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Snapshot being backed up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Read-only snapshot root
    pub path: PathBuf,
    /// Prefix for set names, e.g. the pool name
    pub label: Option<String>,
    /// Inclusion patterns relative to the snapshot root
    pub include: Vec<String>,
    pub seal_policy: SealPolicy,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            label: None,
            include: vec![".".to_string()],
            seal_policy: SealPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetsConfig {
    /// Directory holding `.list` / `.info` pairs
    pub path: PathBuf,
    /// Crawl checkpoint; defaults below the XDG data dir
    pub state_file: Option<PathBuf>,
    pub upload_limit_mb: u64,
    /// Overrides `upload_limit_mb` when set
    pub upload_limit_bytes: Option<u64>,
}

impl Default for SetsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sets"),
            state_file: None,
            upload_limit_mb: 4096,
            upload_limit_bytes: None,
        }
    }
}

impl SetsConfig {
    pub fn upload_limit(&self) -> ByteSize {
        self.upload_limit_bytes
            .unwrap_or(self.upload_limit_mb.saturating_mul(MIB))
    }

    pub fn state_file_path(&self) -> Result<PathBuf, BackupError> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => xdg::default_state_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Root of the filesystem-backed object store
    pub store_path: PathBuf,
    pub bucket_dir: String,
    /// Run identifier; uploads default to the current UTC timestamp
    pub generation: Option<String>,
    /// Simulated cold-storage retrieval time of the local store
    pub restore_delay_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("bucket"),
            bucket_dir: String::new(),
            generation: None,
            restore_delay_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scratch space for archives in flight
    pub buffer_path: PathBuf,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub connectivity_poll_ms: u64,
    pub compression_level: u32,
    pub min_free_mb: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_path: std::env::temp_dir().join("coldset"),
            retry_attempts: 3,
            retry_delay_ms: 5_000,
            connectivity_poll_ms: 30_000,
            compression_level: crate::archive::DEFAULT_COMPRESSION_LEVEL,
            min_free_mb: 0,
        }
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
            connectivity_poll: Duration::from_millis(self.connectivity_poll_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    pub days: u32,
    pub tier: RestoreTier,
    pub poll_interval_secs: u64,
    pub extract_path: PathBuf,
    pub queue_depth: usize,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            days: crate::pipeline::restore::DEFAULT_RESTORE_DAYS,
            tier: RestoreTier::default(),
            poll_interval_secs: 60,
            extract_path: PathBuf::from("restore"),
            queue_depth: 4,
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColdsetConfig {
    pub snapshot: SnapshotConfig,
    pub sets: SetsConfig,
    pub remote: RemoteConfig,
    pub pipeline: PipelineConfig,
    pub restore: RestoreConfig,
    /// Continue when inclusion patterns match nothing
    pub ignore_warnings: bool,
    pub logging: LoggingConfig,
}

impl ColdsetConfig {
    pub fn validate(&self) -> Result<(), BackupError> {
        if self.sets.upload_limit() == 0 {
            return Err(BackupError::ConfigError(
                "upload limit must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.retry_attempts == 0 {
            return Err(BackupError::ConfigError(
                "pipeline.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.compression_level > 9 {
            return Err(BackupError::ConfigError(format!(
                "pipeline.compression_level must be 0-9, got {}",
                self.pipeline.compression_level
            )));
        }
        if self.restore.days == 0 {
            return Err(BackupError::ConfigError(
                "restore.days must be at least 1".to_string(),
            ));
        }
        if self.restore.queue_depth == 0 {
            return Err(BackupError::ConfigError(
                "restore.queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Free space the buffer directory needs before an upload starts.
    pub fn required_buffer_space(&self) -> ByteSize {
        self.sets
            .upload_limit()
            .max(self.pipeline.min_free_mb.saturating_mul(MIB))
    }
}
