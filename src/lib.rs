//! Coldset: size-bounded cold storage backups
//!
//! Crawls a read-only filesystem snapshot, partitions it into sets that each
//! fit a per-request size ceiling, and moves the sets to cold object storage
//! through a resumable archive/upload pipeline. A symmetric pipeline restores
//! them.

pub mod archive;
pub mod backup;
pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod partition;
pub mod pipeline;
pub mod retry;
pub mod seal;
pub mod sets;
pub mod size;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
