//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::ColdsetConfig;
use crate::error::BackupError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from all sources.
    pub fn load(explicit: Option<&Path>) -> Result<ColdsetConfig, BackupError> {
        let config = MergeService::load(explicit)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a single file over the defaults.
    pub fn load_from_file(path: &Path) -> Result<ColdsetConfig, BackupError> {
        let config = MergeService::load_file_only(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> ColdsetConfig {
        ColdsetConfig::default()
    }
}
