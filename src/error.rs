//! Error types
//!
//! One error enum covers the whole crate. Variants are grouped by how the
//! caller is expected to react: policy violations and consistency failures
//! are fatal, transport failures may be retried, and exhausted retries are
//! counted per job.

use crate::size::size_to_string;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = BackupError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BackupError {
    // --- Policy violations ---
    #[error(
        "File size exceeds upload limit: {} (size={}, upload_limit={})",
        .path.display(),
        size_to_string(*.size),
        size_to_string(*.limit)
    )]
    SizeLimitExceeded { path: PathBuf, size: u64, limit: u64 },

    #[error("Invalid path component {name:?} below {}", .parent.display())]
    InvalidName { name: String, parent: PathBuf },

    #[error("Invalid inclusion pattern {0:?}")]
    InvalidPattern(String),

    #[error("Invalid storage key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    // --- Consistency ---
    #[error(
        "Mismatch: {what} under {}: walk={walk}, recount={recount}, diff: {}",
        .path.display(),
        *.walk as i128 - *.recount as i128
    )]
    ConsistencyMismatch {
        what: &'static str,
        path: PathBuf,
        walk: u64,
        recount: u64,
    },

    // --- Transport ---
    #[error("{op} failed: {message}")]
    Transport { op: String, message: String },

    #[error("{op} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        op: String,
        attempts: u32,
        last: String,
    },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object {0} is in cold storage and has not been restored")]
    NotRestored(String),

    #[error(
        "No archived objects found under {0:?}. Check that the generation exists in the bucket \
         (it may contain slashes for subdirectories)."
    )]
    NothingToRestore(String),

    // --- Local resources ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(
        "Not enough disk space in buffer path {} (required={}, available={})",
        .path.display(),
        size_to_string(*.required),
        size_to_string(*.available)
    )]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    // --- Persisted state ---
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Checkpoint schema version {found} is not supported (expected {expected})")]
    CheckpointVersion { found: u32, expected: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid set descriptor {}: {reason}", .path.display())]
    InvalidSet { path: PathBuf, reason: String },

    // --- Configuration and control ---
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("{0} job(s) failed")]
    JobsFailed(usize),

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

impl BackupError {
    /// Build a transport error for an object store operation
    pub fn transport(op: impl Into<String>, message: impl std::fmt::Display) -> Self {
        BackupError::Transport {
            op: op.into(),
            message: message.to_string(),
        }
    }

    /// Whether retrying the failed operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            BackupError::Transport { .. } => true,
            BackupError::Io(e) => is_retryable_io(e),
            _ => false,
        }
    }
}

/// Whether an I/O error is transient and worth retrying.
pub fn is_retryable_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
    )
}

impl From<config::ConfigError> for BackupError {
    fn from(err: config::ConfigError) -> Self {
        BackupError::ConfigError(err.to_string())
    }
}

impl From<bincode::Error> for BackupError {
    fn from(err: bincode::Error) -> Self {
        BackupError::Checkpoint(err.to_string())
    }
}
