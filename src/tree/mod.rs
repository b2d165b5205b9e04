//! Snapshot tree: crawl, size accounting and checkpointing.

pub mod checkpoint;
pub mod counter;
pub mod crawler;
pub mod node;

pub use counter::{DualCounter, FileTally, IndependentCounter, ReadDirCounter};
pub use crawler::{CrawlOutcome, TreeCrawler};
pub use node::{DirectoryNode, Tree};
