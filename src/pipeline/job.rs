//! Archive job records and their local artifacts

use crate::error::Result;
use crate::sets::SetDescriptor;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Local files produced for one job, deleted exactly once.
///
/// Call [`JobArtifacts::cleanup`] on every normal path to observe errors.
/// Dropping an uncleaned guard removes the files and logs failures.
#[derive(Debug, Default)]
pub struct JobArtifacts {
    paths: Vec<PathBuf>,
    cleaned: bool,
}

impl JobArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` before creating it, so partial files are covered.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned {
            return Ok(());
        }
        for path in &self.paths {
            remove_if_exists(path)?;
        }
        self.cleaned = true;
        Ok(())
    }
}

impl Drop for JobArtifacts {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        for path in &self.paths {
            if let Err(e) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove job artifact");
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed job artifact");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveMetrics {
    pub source_bytes: u64,
    pub archive_bytes: u64,
    pub elapsed: Duration,
}

/// A set whose archives are built and waiting for upload
#[derive(Debug)]
pub struct ArchiveJob {
    /// 1-based position in the run
    pub index: usize,
    pub set: SetDescriptor,
    pub archive: PathBuf,
    pub archive_name: String,
    pub manifest_archive: PathBuf,
    pub manifest_archive_name: String,
    pub metrics: ArchiveMetrics,
    pub artifacts: JobArtifacts,
}
