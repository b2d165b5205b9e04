//! Object store abstraction
//!
//! Remote storage is reached only through [`ObjectStore`]. Keys are
//! `/`-separated and laid out by [`RemoteLayout`]. A filesystem-backed
//! implementation lives in [`local`].

pub mod local;

pub use local::LocalObjectStore;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Storage class an object is written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Standard,
    /// Cold storage: objects must be restored before they can be read
    DeepArchive,
}

/// Retrieval speed requested for a restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreTier {
    Expedited,
    #[default]
    Standard,
    Bulk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub storage_class: StorageClass,
}

impl ObjectInfo {
    /// Last key segment
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Retrieval state of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    /// Archived, no restore requested
    Archived,
    InProgress,
    /// Readable with [`ObjectStore::get`]
    Ready,
}

/// Outcome of a restore request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreRequest {
    Initiated,
    AlreadyInProgress,
    /// Already restored; the copy now stays readable for the requested days
    Extended,
    /// The object is not in an archive class and can be read directly
    NotRequired,
}

pub trait ObjectStore: Send + Sync {
    /// Upload the file at `source` to `key`.
    fn put(&self, key: &str, source: &Path, class: StorageClass) -> Result<()>;

    /// Download `key` into `dest`, returning the byte count.
    fn get(&self, key: &str, dest: &Path) -> Result<u64>;

    /// Objects whose key starts with `prefix`, sorted by key.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    fn request_restore(&self, key: &str, days: u32, tier: RestoreTier) -> Result<RestoreRequest>;

    fn restore_state(&self, key: &str) -> Result<RestoreState>;

    /// Whether the store can currently be reached at all.
    fn is_reachable(&self) -> bool;

    /// Drop leftovers of interrupted uploads below `prefix`. Returns the
    /// number of aborted uploads.
    fn abort_incomplete_uploads(&self, prefix: &str) -> Result<usize>;

    /// Upload an in-memory payload.
    fn put_bytes(&self, key: &str, data: &[u8], class: StorageClass) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new()?;
        tmp.write_all(data)?;
        tmp.flush()?;
        self.put(key, tmp.path(), class)
    }
}

/// Key layout of one backup run: `{bucket_dir}{generation}/{name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    bucket_dir: String,
    generation: String,
}

impl RemoteLayout {
    pub fn new(bucket_dir: &str, generation: &str) -> Self {
        Self {
            bucket_dir: normalize_bucket_dir(bucket_dir),
            generation: generation.trim_matches('/').to_string(),
        }
    }

    pub fn bucket_dir(&self) -> &str {
        &self.bucket_dir
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Prefix shared by every object of this run, ending in `/`
    pub fn prefix(&self) -> String {
        format!("{}{}/", self.bucket_dir, self.generation)
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }
}

/// Strip leading and trailing `/`, then end a non-empty dir with one `/`.
pub fn normalize_bucket_dir(bucket_dir: &str) -> String {
    let trimmed = bucket_dir.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

pub const RUN_DESCRIPTOR_NAME: &str = "restore.json";

/// Uploaded next to the archives so a restore can be set up from the
/// remote side alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub generation: String,
    pub bucket_dir: String,
    pub label: Option<String>,
    pub archive_extension: String,
    pub created_at: DateTime<Utc>,
    pub tool_version: String,
}

impl RunDescriptor {
    pub fn new(layout: &RemoteLayout, label: Option<String>, archive_extension: &str) -> Self {
        Self {
            generation: layout.generation().to_string(),
            bucket_dir: layout.bucket_dir().to_string(),
            label,
            archive_extension: archive_extension.to_string(),
            created_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn upload(&self, store: &dyn ObjectStore, layout: &RemoteLayout) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        store.put_bytes(&layout.key(RUN_DESCRIPTOR_NAME), &data, StorageClass::Standard)
    }
}
