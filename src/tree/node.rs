//! Directory tree arena with cached aggregate sizes.

use crate::error::{BackupError, Result};
use crate::types::{ByteSize, NodeId};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Directory node
///
/// Files are leaves stored by name on their parent; only directories get
/// their own arena slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub dirs: BTreeMap<String, NodeId>, // name -> child node
    pub files: BTreeMap<String, ByteSize>,
    /// The crawl left out entries somewhere below this directory
    pub pruned: bool,
    #[serde(skip)]
    size: OnceCell<ByteSize>,
}

impl DirectoryNode {
    fn new(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            dirs: BTreeMap::new(),
            files: BTreeMap::new(),
            pruned: false,
            size: OnceCell::new(),
        }
    }
}

/// In-memory tree of one snapshot, rooted at the snapshot path
#[derive(Debug, Clone)]
pub struct Tree {
    snapshot_root: PathBuf,
    size_limit: ByteSize,
    nodes: Vec<DirectoryNode>,
}

impl Tree {
    pub const ROOT: NodeId = 0;

    pub fn new(snapshot_root: impl Into<PathBuf>, size_limit: ByteSize) -> Self {
        Self {
            snapshot_root: snapshot_root.into(),
            size_limit,
            nodes: vec![DirectoryNode::new(String::new(), None)],
        }
    }

    /// Rebuild a tree from a persisted arena.
    pub(crate) fn from_parts(
        snapshot_root: PathBuf,
        size_limit: ByteSize,
        nodes: Vec<DirectoryNode>,
    ) -> Result<Self> {
        if nodes.is_empty() || nodes[Self::ROOT].parent.is_some() {
            return Err(BackupError::Checkpoint(
                "node arena has no root".to_string(),
            ));
        }
        for (id, node) in nodes.iter().enumerate() {
            for &child in node.dirs.values() {
                if child >= nodes.len() || nodes[child].parent != Some(id) {
                    return Err(BackupError::Checkpoint(format!(
                        "node {} references invalid child {}",
                        id, child
                    )));
                }
            }
        }
        Ok(Self {
            snapshot_root,
            size_limit,
            nodes,
        })
    }

    pub(crate) fn nodes(&self) -> &[DirectoryNode] {
        &self.nodes
    }

    pub fn snapshot_root(&self) -> &Path {
        &self.snapshot_root
    }

    pub fn size_limit(&self) -> ByteSize {
        self.size_limit
    }

    pub fn node(&self, id: NodeId) -> &DirectoryNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[Self::ROOT].files.is_empty()
    }

    /// Get or create the child directory `name` of `parent`.
    pub fn get_dir(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        if let Some(&id) = self.nodes[parent].dirs.get(name) {
            return Ok(id);
        }
        self.validate_name(parent, name)?;
        let id = self.nodes.len();
        self.nodes.push(DirectoryNode::new(name.to_string(), Some(parent)));
        self.nodes[parent].dirs.insert(name.to_string(), id);
        Ok(id)
    }

    /// Materialize every directory component of `rel_path`.
    pub fn dir_path(&mut self, rel_path: &Path) -> Result<NodeId> {
        let mut node = Self::ROOT;
        for component in rel_path.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(name) => {
                    let name = self.utf8_name(node, name)?;
                    node = self.get_dir(node, name)?;
                }
                other => {
                    return Err(BackupError::InvalidName {
                        name: other.as_os_str().to_string_lossy().into_owned(),
                        parent: self.full_path(node),
                    })
                }
            }
        }
        Ok(node)
    }

    /// Add a file directly below `parent`, enforcing the size limit.
    pub fn add_file(&mut self, parent: NodeId, name: &str, size: ByteSize) -> Result<()> {
        self.validate_name(parent, name)?;
        if size > self.size_limit {
            return Err(BackupError::SizeLimitExceeded {
                path: self.full_path(parent).join(name),
                size,
                limit: self.size_limit,
            });
        }
        self.nodes[parent].files.insert(name.to_string(), size);
        self.invalidate_sizes(parent);
        Ok(())
    }

    /// Insert a file by its path relative to the snapshot root.
    pub fn insert_file(&mut self, rel_path: &Path, size: ByteSize) -> Result<()> {
        let parent = match rel_path.parent() {
            Some(dir) => self.dir_path(dir)?,
            None => Self::ROOT,
        };
        let name = match rel_path.file_name() {
            Some(name) => self.utf8_name(parent, name)?,
            None => "",
        };
        self.add_file(parent, name, size)
    }

    /// Record that the crawl dropped something below `id`.
    ///
    /// The mark propagates to every ancestor, since none of them can be
    /// archived as a whole any more.
    pub fn mark_pruned(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &mut self.nodes[node_id];
            if node.pruned {
                break;
            }
            node.pruned = true;
            current = node.parent;
        }
    }

    /// Whether the subtree at `id` holds everything that is on disk below it.
    pub fn is_complete(&self, id: NodeId) -> bool {
        !self.nodes[id].pruned
    }

    /// Aggregate size of a directory: own files plus all descendants.
    pub fn size(&self, id: NodeId) -> ByteSize {
        let node = &self.nodes[id];
        *node.size.get_or_init(|| {
            let files: ByteSize = node.files.values().sum();
            let dirs: ByteSize = node.dirs.values().map(|&child| self.size(child)).sum();
            files + dirs
        })
    }

    /// Path of a node relative to the snapshot root; empty for the root.
    pub fn rel_path(&self, id: NodeId) -> PathBuf {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id];
            if node.parent.is_some() {
                names.push(node.name.as_str());
            }
            current = node.parent;
        }
        names.iter().rev().collect()
    }

    pub fn full_path(&self, id: NodeId) -> PathBuf {
        self.snapshot_root.join(self.rel_path(id))
    }

    /// Find the directory node at `rel_path`, if it was crawled.
    pub fn lookup(&self, rel_path: &Path) -> Option<NodeId> {
        let mut node = Self::ROOT;
        for component in rel_path.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(name) => {
                    node = *self.nodes[node].dirs.get(name.to_str()?)?;
                }
                _ => return None,
            }
        }
        Some(node)
    }

    /// Recursive (directories, files) count, the node itself included.
    pub fn count(&self, id: NodeId) -> (u64, u64) {
        let node = &self.nodes[id];
        node.dirs
            .values()
            .fold((1, node.files.len() as u64), |(dirs, files), &child| {
                let (d, f) = self.count(child);
                (dirs + d, files + f)
            })
    }

    /// Every file below `id`, as paths relative to the snapshot root.
    pub fn files_below(&self, id: NodeId) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            let base = self.rel_path(node_id);
            let node = &self.nodes[node_id];
            out.extend(node.files.keys().map(|name| base.join(name)));
            stack.extend(node.dirs.values().copied());
        }
        out
    }

    fn utf8_name<'n>(&self, parent: NodeId, name: &'n OsStr) -> Result<&'n str> {
        name.to_str().ok_or_else(|| BackupError::InvalidName {
            name: name.to_string_lossy().into_owned(),
            parent: self.full_path(parent),
        })
    }

    /// Set lists are line oriented, so a newline can never be part of a name.
    fn validate_name(&self, parent: NodeId, name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\n')
        {
            return Err(BackupError::InvalidName {
                name: name.to_string(),
                parent: self.full_path(parent),
            });
        }
        Ok(())
    }

    fn invalidate_sizes(&mut self, from: NodeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let node = &mut self.nodes[id];
            node.size.take();
            current = node.parent;
        }
    }
}
