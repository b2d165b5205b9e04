//! Persisted sets
//!
//! A set on disk is a `.list` file (one relative path per line) plus a
//! `.info` JSON sidecar with the same stem. The sidecar is written last and
//! removed first, so its presence marks a complete set.

pub mod writer;

pub use writer::SetWriter;

use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LIST_EXTENSION: &str = "list";
pub const INFO_EXTENSION: &str = "info";

/// Contents of the `.info` sidecar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInfo {
    pub size_bytes: u64,
    #[serde(default)]
    pub dir_count: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub item_count: u64,
}

/// A complete set found in the set directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDescriptor {
    pub dir: PathBuf,
    pub stem: String,
    pub info: SetInfo,
}

impl SetDescriptor {
    pub fn list_path(&self) -> PathBuf {
        self.dir.join(self.list_file_name())
    }

    pub fn info_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, INFO_EXTENSION))
    }

    pub fn list_file_name(&self) -> String {
        format!("{}.{}", self.stem, LIST_EXTENSION)
    }

    /// Entries of the `.list` file, in file order.
    pub fn read_items(&self) -> Result<Vec<String>> {
        read_list(&self.list_path())
    }

    /// Delete the set: sidecar first, then the list.
    pub fn remove(&self) -> Result<()> {
        fs::remove_file(self.info_path())?;
        fs::remove_file(self.list_path())?;
        debug!(set = %self.stem, "Removed set descriptor");
        Ok(())
    }
}

/// Read a line-oriented entry list.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Every complete set in `set_dir`, sorted by stem.
///
/// A missing directory holds no sets. A sidecar without its list is an error.
pub fn discover(set_dir: &Path) -> Result<Vec<SetDescriptor>> {
    if !set_dir.is_dir() {
        debug!(path = %set_dir.display(), "Set directory does not exist");
        return Ok(Vec::new());
    }

    let mut sets = Vec::new();
    for entry in fs::read_dir(set_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(INFO_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let info: SetInfo = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let set = SetDescriptor {
            dir: set_dir.to_path_buf(),
            stem: stem.to_string(),
            info,
        };
        if !set.list_path().is_file() {
            return Err(BackupError::InvalidSet {
                path: set.info_path(),
                reason: format!("missing {}", set.list_file_name()),
            });
        }
        sets.push(set);
    }
    sets.sort_by(|a, b| a.stem.cmp(&b.stem));
    Ok(sets)
}
