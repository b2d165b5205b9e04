//! Snapshot crawler
//!
//! Walks every inclusion path below the snapshot root and records files in
//! the tree. After each inclusion path the walk totals are checked against an
//! independent recount.

use super::counter::{is_leaf, DualCounter, FileTally, IndependentCounter, ReadDirCounter};
use super::node::Tree;
use crate::error::Result;
use crate::seal::{self, SealPolicy};
use crate::size::size_to_string;
use crate::types::ByteSize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Result of a completed crawl
#[derive(Debug)]
pub struct CrawlOutcome {
    pub tree: Tree,
    pub files: DualCounter,
    pub bytes: DualCounter,
    /// Sealed directories left out of the crawl
    pub skipped: Vec<PathBuf>,
}

pub struct TreeCrawler<C: IndependentCounter = ReadDirCounter> {
    snapshot_root: PathBuf,
    size_limit: ByteSize,
    seal_policy: SealPolicy,
    counter: C,
}

impl TreeCrawler<ReadDirCounter> {
    pub fn new(snapshot_root: impl Into<PathBuf>, size_limit: ByteSize) -> Self {
        Self {
            snapshot_root: snapshot_root.into(),
            size_limit,
            seal_policy: SealPolicy::default(),
            counter: ReadDirCounter,
        }
    }
}

impl<C: IndependentCounter> TreeCrawler<C> {
    pub fn with_seal_policy(mut self, seal_policy: SealPolicy) -> Self {
        self.seal_policy = seal_policy;
        self
    }

    /// Replace the recount implementation.
    pub fn with_counter<D: IndependentCounter>(self, counter: D) -> TreeCrawler<D> {
        TreeCrawler {
            snapshot_root: self.snapshot_root,
            size_limit: self.size_limit,
            seal_policy: self.seal_policy,
            counter,
        }
    }

    /// Crawl all `inclusion_paths` (relative to the snapshot root).
    pub fn crawl(&self, inclusion_paths: &[PathBuf]) -> Result<CrawlOutcome> {
        let mut tree = Tree::new(&self.snapshot_root, self.size_limit);
        let mut files = DualCounter::new("files");
        let mut bytes = DualCounter::new("size");
        let mut skipped = Vec::new();

        for rel in inclusion_paths {
            let path = self.snapshot_root.join(rel);
            info!(path = %path.display(), "Crawling");

            let mut sub_files = DualCounter::new("subfiles");
            let mut sub_bytes = DualCounter::new("subsize");

            let (walked, sub_skipped) = self.walk(&mut tree, &path)?;
            sub_files.add_walk(walked.files);
            sub_bytes.add_walk(walked.bytes);

            let skip: HashSet<PathBuf> = sub_skipped.iter().cloned().collect();
            let recounted = self.counter.count(&path, &skip)?;
            sub_files.add_recount(recounted.files);
            sub_bytes.add_recount(recounted.bytes);
            sub_files.verify(&path)?;
            sub_bytes.verify(&path)?;

            debug!(
                path = %path.display(),
                files = walked.files,
                bytes = walked.bytes,
                skipped = sub_skipped.len(),
                "Inclusion path verified"
            );
            files += sub_files;
            bytes += sub_bytes;
            skipped.extend(sub_skipped);
        }

        files.verify(&self.snapshot_root)?;
        bytes.verify(&self.snapshot_root)?;
        info!(
            files = files.walk,
            total = %size_to_string(bytes.walk),
            "Crawl complete"
        );

        Ok(CrawlOutcome {
            tree,
            files,
            bytes,
            skipped,
        })
    }

    /// Walk one inclusion path into `tree`.
    fn walk(&self, tree: &mut Tree, path: &Path) -> Result<(FileTally, Vec<PathBuf>)> {
        let mut tally = FileTally::default();
        let mut skipped = Vec::new();

        let meta = std::fs::symlink_metadata(path)?;
        if !meta.is_dir() {
            if is_leaf(&meta.file_type()) {
                tree.insert_file(self.relative(path), meta.len())?;
                tally.add_file(meta.len());
            } else {
                debug!(path = %path.display(), "Skipping special file");
            }
            return Ok((tally, skipped));
        }

        let skip_sealed = self.seal_policy.is_skip_sealed();
        let walker = WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let sealed = skip_sealed && entry.file_type().is_dir() && seal::is_sealed(entry.path());
                if sealed {
                    info!(path = %entry.path().display(), "Skipping sealed directory");
                    skipped.push(entry.path().to_path_buf());
                }
                !sealed
            });

        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            let rel = self.relative(entry.path());
            if file_type.is_dir() {
                tree.dir_path(rel)?;
            } else if is_leaf(&file_type) {
                let size = entry.metadata()?.len();
                tree.insert_file(rel, size)?;
                tally.add_file(size);
            } else {
                debug!(path = %entry.path().display(), "Skipping special file");
                self.prune_parent(tree, rel)?;
            }
        }

        for sealed in &skipped {
            if sealed.as_path() != path {
                self.prune_parent(tree, self.relative(sealed))?;
            }
        }
        Ok((tally, skipped))
    }

    /// The directory holding a left-out entry can no longer be archived whole.
    fn prune_parent(&self, tree: &mut Tree, rel: &Path) -> Result<()> {
        let parent = tree.dir_path(rel.parent().unwrap_or(Path::new("")))?;
        tree.mark_pruned(parent);
        Ok(())
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.snapshot_root).unwrap_or(path)
    }
}
