//! Core types shared across the crawl, partition and transfer stages.

/// NodeId: index of a directory node in the tree arena
pub type NodeId = usize;

/// ByteSize: sizes are always counted in bytes
pub type ByteSize = u64;

/// Bytes per MiB, the unit upload limits are configured in
pub const MIB: ByteSize = 1024 * 1024;
