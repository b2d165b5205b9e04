//! Set partitioning
//!
//! Splits the crawled tree into size-bounded sets. A directory that fits the
//! limit, lies inside an inclusion path and was crawled completely becomes a
//! single item; anything else is split into its files and subdirectories. The
//! resulting items are then bin-packed.

pub mod binpack;

use crate::tree::Tree;
use crate::types::{ByteSize, NodeId};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Directory(NodeId),
}

/// One entry of a set: a file or a whole directory subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Relative to the snapshot root; empty for the root itself
    pub path: PathBuf,
    pub size: ByteSize,
    pub kind: ItemKind,
}

/// Inclusion paths, relative to the snapshot root
#[derive(Debug, Clone, Default)]
pub struct Inclusions {
    paths: Vec<PathBuf>,
}

impl Inclusions {
    pub fn new(mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        paths.dedup();
        Self { paths }
    }

    /// Whether `path` equals an inclusion path or lies below one.
    ///
    /// Matching is per component, so `a/bc` is not inside `a/b`.
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|inclusion| path.starts_with(inclusion))
    }
}

/// A set ready to be written
#[derive(Debug, Clone)]
pub struct PlannedSet {
    pub items: Vec<Item>,
    pub total_size: ByteSize,
    /// Directories below directory items, the items themselves included
    pub dir_count: u64,
    pub file_count: u64,
}

impl PlannedSet {
    pub fn item_paths(&self) -> impl Iterator<Item = &Path> {
        self.items.iter().map(|item| item.path.as_path())
    }
}

pub struct SetPartitioner<'t> {
    tree: &'t Tree,
    inclusions: Inclusions,
}

impl<'t> SetPartitioner<'t> {
    pub fn new(tree: &'t Tree, inclusions: Inclusions) -> Self {
        Self { tree, inclusions }
    }

    /// Items for the subtree rooted at `id`.
    pub fn collect_items(&self, id: NodeId) -> Vec<Item> {
        let tree = self.tree;
        let limit = tree.size_limit();
        let path = tree.rel_path(id);
        let size = tree.size(id);

        // Archivers pack a directory item from disk, so a subtree the crawl
        // left entries out of must be listed file by file.
        if size <= limit && tree.is_complete(id) && self.inclusions.contains(&path) {
            return vec![Item {
                path,
                size,
                kind: ItemKind::Directory(id),
            }];
        }

        let node = tree.node(id);
        let mut items = Vec::new();
        for (name, &file_size) in &node.files {
            let file_path = path.join(name);
            if self.inclusions.contains(&file_path) {
                items.push(Item {
                    path: file_path,
                    size: file_size,
                    kind: ItemKind::File,
                });
            }
        }
        for &child in node.dirs.values() {
            items.extend(self.collect_items(child));
        }
        items
    }

    /// Partition the whole tree into sets.
    pub fn partition(&self) -> Vec<PlannedSet> {
        let items = self.collect_items(Tree::ROOT);
        debug!(items = items.len(), "Collected partition items");

        let sets: Vec<PlannedSet> = binpack::pack(items, self.tree.size_limit())
            .into_iter()
            .map(|bin| self.plan(bin))
            .collect();
        info!(sets = sets.len(), "Partitioned snapshot");
        sets
    }

    fn plan(&self, items: Vec<Item>) -> PlannedSet {
        let mut total_size = 0;
        let mut dir_count = 0;
        let mut file_count = 0;
        for item in &items {
            total_size += item.size;
            match item.kind {
                ItemKind::File => file_count += 1,
                ItemKind::Directory(id) => {
                    let (dirs, files) = self.tree.count(id);
                    dir_count += dirs;
                    file_count += files;
                }
            }
        }
        PlannedSet {
            items,
            total_size,
            dir_count,
            file_count,
        }
    }
}
