//! Crawl cross-checks
//!
//! The crawler counts files and bytes while it walks. An independent
//! enumeration over the same path must arrive at the same numbers, otherwise
//! the walk cannot be trusted.

use crate::error::{BackupError, Result};
use std::collections::HashSet;
use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

/// File and byte totals for one enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTally {
    pub files: u64,
    pub bytes: u64,
}

impl FileTally {
    pub fn add_file(&mut self, size: u64) {
        self.files += 1;
        self.bytes += size;
    }
}

impl AddAssign for FileTally {
    fn add_assign(&mut self, rhs: Self) {
        self.files += rhs.files;
        self.bytes += rhs.bytes;
    }
}

/// A pair of counts that must agree
#[derive(Debug, Clone, Copy)]
pub struct DualCounter {
    what: &'static str,
    pub walk: u64,
    pub recount: u64,
}

impl DualCounter {
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            walk: 0,
            recount: 0,
        }
    }

    pub fn add_walk(&mut self, count: u64) {
        self.walk += count;
    }

    pub fn add_recount(&mut self, count: u64) {
        self.recount += count;
    }

    pub fn verify(&self, path: &Path) -> Result<()> {
        if self.walk != self.recount {
            return Err(BackupError::ConsistencyMismatch {
                what: self.what,
                path: path.to_path_buf(),
                walk: self.walk,
                recount: self.recount,
            });
        }
        Ok(())
    }
}

impl AddAssign for DualCounter {
    fn add_assign(&mut self, rhs: Self) {
        self.walk += rhs.walk;
        self.recount += rhs.recount;
    }
}

/// Second enumeration used to validate the structural walk
pub trait IndependentCounter {
    /// Count regular files and symlinks at or below `path` without following
    /// links, ignoring every directory in `skip`.
    fn count(&self, path: &Path, skip: &HashSet<PathBuf>) -> Result<FileTally>;
}

/// Explicit-stack `read_dir` enumeration sized by `lstat`
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadDirCounter;

impl IndependentCounter for ReadDirCounter {
    fn count(&self, path: &Path, skip: &HashSet<PathBuf>) -> Result<FileTally> {
        let mut tally = FileTally::default();
        let meta = fs::symlink_metadata(path)?;
        if !meta.is_dir() {
            if is_leaf(&meta.file_type()) {
                tally.add_file(meta.len());
            }
            return Ok(tally);
        }
        if skip.contains(path) {
            return Ok(tally);
        }

        let mut pending = vec![path.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                let entry_path = entry.path();
                if file_type.is_dir() {
                    if !skip.contains(&entry_path) {
                        pending.push(entry_path);
                    }
                } else if is_leaf(&file_type) {
                    tally.add_file(fs::symlink_metadata(&entry_path)?.len());
                }
            }
        }
        Ok(tally)
    }
}

/// Leaves are regular files and symlinks; devices, FIFOs and sockets are not.
pub(crate) fn is_leaf(file_type: &fs::FileType) -> bool {
    file_type.is_file() || file_type.is_symlink()
}
