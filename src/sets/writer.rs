//! Set writer
//!
//! Names are derived from the longest common prefix of the member paths and
//! made unique with a three digit counter. Existing sets are never
//! overwritten.

use super::{SetDescriptor, SetInfo, INFO_EXTENSION, LIST_EXTENSION};
use crate::error::{BackupError, Result};
use crate::partition::PlannedSet;
use crate::size::size_to_string;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FALLBACK_NAME: &str = "set";

pub struct SetWriter {
    set_dir: PathBuf,
    label: Option<String>,
}

impl SetWriter {
    pub fn new(set_dir: impl Into<PathBuf>, label: Option<String>) -> Self {
        Self {
            set_dir: set_dir.into(),
            label: label.filter(|l| !l.is_empty()),
        }
    }

    /// Persist one planned set and return its descriptor.
    pub fn write(&self, set: &PlannedSet) -> Result<SetDescriptor> {
        fs::create_dir_all(&self.set_dir)?;

        let mut entries: Vec<String> = set.item_paths().map(list_entry).collect();
        entries.sort();
        entries.dedup();

        let base = self.base_name(&entries);
        let stem = self.next_free_stem(&base);
        info!(
            set = %stem,
            items = entries.len(),
            size = %size_to_string(set.total_size),
            "Writing set"
        );

        let mut list = String::new();
        for entry in &entries {
            debug!(set = %stem, item = %entry, "Set item");
            list.push_str(entry);
            list.push('\n');
        }
        let info = SetInfo {
            size_bytes: set.total_size,
            dir_count: set.dir_count,
            file_count: set.file_count,
            item_count: entries.len() as u64,
        };

        let descriptor = SetDescriptor {
            dir: self.set_dir.clone(),
            stem,
            info,
        };
        write_new(&descriptor.list_path(), list.as_bytes())?;
        write_new(
            &descriptor.info_path(),
            serde_json::to_string_pretty(&info)?.as_bytes(),
        )?;
        Ok(descriptor)
    }

    /// Sanitized name before the counter suffix.
    pub fn base_name(&self, sorted_entries: &[String]) -> String {
        let prefix = match sorted_entries {
            [] => String::new(),
            [only] => only.clone(),
            [first, .., last] => common_prefix(first, last),
        };
        let name = match &self.label {
            Some(label) => format!("{}/{}", label, prefix),
            None => prefix,
        };
        let name = sanitize(&name);
        if name.is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            name
        }
    }

    fn next_free_stem(&self, base: &str) -> String {
        let mut counter = 0u64;
        loop {
            let stem = format!("{}_{:03}", base, counter);
            let taken = self.set_dir.join(format!("{stem}.{INFO_EXTENSION}")).exists()
                || self.set_dir.join(format!("{stem}.{LIST_EXTENSION}")).exists();
            if !taken {
                return stem;
            }
            counter += 1;
        }
    }
}

/// List file form of an item path: the root is written as `.`.
fn list_entry(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_string()
    } else {
        path.to_string_lossy().into_owned()
    }
}

/// Character-level common prefix of two strings.
pub fn common_prefix(a: &str, b: &str) -> String {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_` and strip
/// trailing underscores.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    replaced.trim_end_matches('_').to_string()
}

/// Write `contents` to `path` via a temp file, failing if `path` exists.
fn write_new(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(path)
        .map_err(|e| BackupError::Io(e.error))?;
    Ok(())
}
