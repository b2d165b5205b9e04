//! Crawl checkpoint
//!
//! The crawled tree is persisted between the crawl and partition phases so an
//! interrupted partition can be rerun without walking the snapshot again.
//! Layout: a fixed header (magic + schema version) followed by the body, both
//! bincode-encoded.

use super::node::{DirectoryNode, Tree};
use crate::error::{BackupError, Result};
use crate::types::ByteSize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const MAGIC: [u8; 8] = *b"COLDTREE";
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 8],
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct Body {
    snapshot_root: PathBuf,
    size_limit: ByteSize,
    inclusion_paths: Vec<PathBuf>,
    nodes: Vec<DirectoryNode>,
}

/// A loaded checkpoint: the tree plus the inclusion paths it was crawled for
#[derive(Debug)]
pub struct Checkpoint {
    pub tree: Tree,
    pub inclusion_paths: Vec<PathBuf>,
}

/// Atomically write `tree` and `inclusion_paths` to `path`.
pub fn save(path: &Path, tree: &Tree, inclusion_paths: &[PathBuf]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        bincode::serialize_into(
            &mut writer,
            &Header {
                magic: MAGIC,
                version: SCHEMA_VERSION,
            },
        )?;
        bincode::serialize_into(
            &mut writer,
            &Body {
                snapshot_root: tree.snapshot_root().to_path_buf(),
                size_limit: tree.size_limit(),
                inclusion_paths: inclusion_paths.to_vec(),
                nodes: tree.nodes().to_vec(),
            },
        )?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| BackupError::Io(e.error))?;
    info!(path = %path.display(), nodes = tree.len(), "Saved crawl checkpoint");
    Ok(())
}

pub fn load(path: &Path) -> Result<Checkpoint> {
    let mut reader = BufReader::new(File::open(path)?);
    let header: Header = bincode::deserialize_from(&mut reader)?;
    if header.magic != MAGIC {
        return Err(BackupError::Checkpoint(format!(
            "{} is not a crawl checkpoint",
            path.display()
        )));
    }
    if header.version != SCHEMA_VERSION {
        return Err(BackupError::CheckpointVersion {
            found: header.version,
            expected: SCHEMA_VERSION,
        });
    }
    let body: Body = bincode::deserialize_from(&mut reader)?;
    let tree = Tree::from_parts(body.snapshot_root, body.size_limit, body.nodes)?;
    Ok(Checkpoint {
        tree,
        inclusion_paths: body.inclusion_paths,
    })
}
