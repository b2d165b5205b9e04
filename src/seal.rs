//! Seal markers
//!
//! A sealed directory carries a marker symlink pointing at the configuration
//! that sealed it. Making the directory immutable is left to the snapshot
//! provider; the crawler only looks for the marker.

use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Marker file name placed inside a sealed directory
pub const SEALED_MARKER: &str = ".COLDSET_SEALED";

/// How the crawler treats sealed directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SealPolicy {
    /// Crawl sealed directories like any other
    #[default]
    Include,
    /// Leave sealed directories out of the crawl
    Skip,
}

impl SealPolicy {
    pub fn is_skip_sealed(self) -> bool {
        self == SealPolicy::Skip
    }
}

pub fn marker_path(dir: &Path) -> PathBuf {
    dir.join(SEALED_MARKER)
}

/// Whether `dir` carries a seal marker. Broken marker links still count.
pub fn is_sealed(dir: &Path) -> bool {
    std::fs::symlink_metadata(marker_path(dir)).is_ok()
}

/// The configuration a sealed directory points at.
pub fn sealed_by(dir: &Path) -> Result<Option<PathBuf>> {
    match std::fs::read_link(marker_path(dir)) {
        Ok(target) => Ok(Some(target)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Mark `dir` as sealed by `config_path`.
pub fn seal_directory(dir: &Path, config_path: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(BackupError::ConfigError(format!(
            "Cannot seal {}: not a directory",
            dir.display()
        )));
    }
    if is_sealed(dir) {
        return Err(BackupError::Aborted(format!(
            "{} is already sealed",
            dir.display()
        )));
    }
    let target = dunce::canonicalize(config_path)?;
    symlink(&target, &marker_path(dir))?;
    info!(dir = %dir.display(), config = %target.display(), "Sealed directory");
    Ok(())
}

/// Remove the seal marker from `dir`. Returns whether a marker was present.
pub fn unseal_directory(dir: &Path) -> Result<bool> {
    match std::fs::remove_file(marker_path(dir)) {
        Ok(()) => {
            info!(dir = %dir.display(), "Unsealed directory");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
