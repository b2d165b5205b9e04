//! Archive building and extraction
//!
//! The pipelines only see the [`ArchiveBuilder`] and [`ArchiveExtractor`]
//! traits. [`TarGzArchive`] is the in-process implementation: a tar stream
//! compressed with gzip, symlinks stored as links.

use crate::error::{BackupError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tar::{Archive, Builder as TarBuilder};
use tracing::debug;

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Packs set entries into a single archive file
pub trait ArchiveBuilder: Send + Sync {
    /// File extension of produced archives, without the leading dot
    fn extension(&self) -> &str;

    /// Archive `entries` (paths relative to `base`, `.` for `base` itself)
    /// into `dest`. Returns the archive size in bytes.
    fn build(&self, base: &Path, entries: &[String], dest: &Path) -> Result<u64>;
}

/// Unpacks an archive produced by the matching builder
pub trait ArchiveExtractor: Send + Sync {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct TarGzArchive {
    compression_level: u32,
}

impl Default for TarGzArchive {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl TarGzArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gzip level, clamped to 0-9.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    fn append_entry<W: Write>(tar: &mut TarBuilder<W>, base: &Path, entry: &str) -> Result<()> {
        if entry == "." || entry.is_empty() {
            tar.append_dir_all("", base)?;
            return Ok(());
        }
        let rel = Path::new(entry);
        if rel.is_absolute() || rel.components().any(|c| c.as_os_str() == "..") {
            return Err(BackupError::Archive(format!(
                "entry {:?} leaves the archive base",
                entry
            )));
        }
        let full = base.join(rel);
        let meta = fs::symlink_metadata(&full)?;
        if meta.is_dir() {
            tar.append_dir_all(rel, &full)?;
        } else {
            tar.append_path_with_name(&full, rel)?;
        }
        Ok(())
    }
}

impl ArchiveBuilder for TarGzArchive {
    fn extension(&self) -> &str {
        "tar.gz"
    }

    fn build(&self, base: &Path, entries: &[String], dest: &Path) -> Result<u64> {
        let file = File::create(dest)?;
        let encoder = GzEncoder::new(
            BufWriter::new(file),
            Compression::new(self.compression_level),
        );
        let mut tar = TarBuilder::new(encoder);
        tar.follow_symlinks(false);

        for entry in entries {
            Self::append_entry(&mut tar, base, entry)?;
        }

        let encoder = tar.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        let size = fs::metadata(dest)?.len();
        debug!(
            archive = %dest.display(),
            entries = entries.len(),
            size,
            "Built archive"
        );
        Ok(size)
    }
}

impl ArchiveExtractor for TarGzArchive {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let decoder = GzDecoder::new(BufReader::new(File::open(archive)?));
        let mut tar = Archive::new(decoder);
        tar.set_preserve_permissions(true);
        tar.set_preserve_mtime(true);
        tar.unpack(dest)
            .map_err(|e| BackupError::Archive(format!("{}: {}", archive.display(), e)))?;
        debug!(archive = %archive.display(), dest = %dest.display(), "Unpacked archive");
        Ok(())
    }
}
