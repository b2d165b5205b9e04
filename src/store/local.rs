//! Filesystem-backed object store
//!
//! Objects live under the store root at their key. Per-object metadata
//! (storage class, size, restore request) is kept in JSON sidecars below
//! `.coldset/meta`, in-flight uploads are staged in `.coldset/uploads`.
//! Deep-archive objects only become readable `restore_delay` after a restore
//! was requested, and fall back to archived once the requested number of days
//! has passed.

use super::{ObjectInfo, ObjectStore, RestoreRequest, RestoreState, RestoreTier, StorageClass};
use crate::error::{BackupError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

const INTERNAL_DIR: &str = ".coldset";
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RestoreRecord {
    requested_at: DateTime<Utc>,
    days: u32,
    tier: RestoreTier,
    /// Latest request against the restored copy; expiry counts from here
    #[serde(default)]
    extended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectMeta {
    storage_class: StorageClass,
    size: u64,
    restore: Option<RestoreRecord>,
}

pub struct LocalObjectStore {
    root: PathBuf,
    restore_delay: Duration,
    restore_day: Duration,
    meta_lock: Mutex<()>,
}

impl LocalObjectStore {
    /// Open (and create) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(INTERNAL_DIR).join("meta"))?;
        fs::create_dir_all(root.join(INTERNAL_DIR).join("uploads"))?;
        Ok(Self {
            root: dunce::canonicalize(&root)?,
            restore_delay: Duration::ZERO,
            restore_day: DAY,
            meta_lock: Mutex::new(()),
        })
    }

    /// Simulated time between a restore request and readability.
    pub fn with_restore_delay(mut self, delay: Duration) -> Self {
        self.restore_delay = delay;
        self
    }

    /// Length of one restore day, 24 hours unless shortened.
    pub fn with_restore_day(mut self, day: Duration) -> Self {
        self.restore_day = day;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject keys that could escape the store root.
    fn validate_key(key: &str) -> Result<()> {
        let unsafe_key = |reason: &'static str| {
            Err(BackupError::InvalidKey {
                key: key.to_string(),
                reason,
            })
        };
        if key.is_empty() {
            return unsafe_key("empty");
        }
        if key.starts_with('/') || key.contains('\\') {
            return unsafe_key("not a relative key");
        }
        if key.split('/').next() == Some(INTERNAL_DIR) {
            return unsafe_key("reserved prefix");
        }
        if Path::new(key)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
        {
            return unsafe_key("dot segment");
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root
            .join(INTERNAL_DIR)
            .join("meta")
            .join(format!("{key}.json"))
    }

    fn uploads_dir(&self) -> PathBuf {
        self.root.join(INTERNAL_DIR).join("uploads")
    }

    fn read_meta(&self, key: &str) -> Result<ObjectMeta> {
        match fs::read_to_string(self.meta_path(key)) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BackupError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_meta(&self, key: &str, meta: &ObjectMeta) -> Result<()> {
        let path = self.meta_path(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(tmp.as_file(), meta)?;
        tmp.persist(&path).map_err(|e| BackupError::Io(e.error))?;
        Ok(())
    }

    fn state_of(&self, meta: &ObjectMeta) -> RestoreState {
        if meta.storage_class != StorageClass::DeepArchive {
            return RestoreState::Ready;
        }
        let Some(record) = &meta.restore else {
            return RestoreState::Archived;
        };
        let elapsed = since(record.requested_at);
        if elapsed < self.restore_delay {
            return RestoreState::InProgress;
        }
        let available_for = match record.extended_at {
            Some(at) => since(at),
            None => elapsed - self.restore_delay,
        };
        if available_for >= self.restore_day.saturating_mul(record.days) {
            RestoreState::Archived
        } else {
            RestoreState::Ready
        }
    }
}

/// Time passed since `at`; zero for timestamps in the future.
fn since(at: DateTime<Utc>) -> Duration {
    (Utc::now() - at).to_std().unwrap_or(Duration::ZERO)
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, source: &Path, class: StorageClass) -> Result<()> {
        let dest = self.object_path(key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut staged = tempfile::NamedTempFile::new_in(self.uploads_dir())?;
        let size = io::copy(&mut fs::File::open(source)?, staged.as_file_mut())?;
        staged.as_file().sync_all()?;

        let _guard = self.meta_lock.lock();
        staged.persist(&dest).map_err(|e| BackupError::Io(e.error))?;
        self.write_meta(
            key,
            &ObjectMeta {
                storage_class: class,
                size,
                restore: None,
            },
        )?;
        debug!(key, size, ?class, "Stored object");
        Ok(())
    }

    fn get(&self, key: &str, dest: &Path) -> Result<u64> {
        let source = self.object_path(key)?;
        let meta = {
            let _guard = self.meta_lock.lock();
            self.read_meta(key)?
        };
        if self.state_of(&meta) != RestoreState::Ready {
            return Err(BackupError::NotRestored(key.to_string()));
        }
        let size = fs::copy(&source, dest)?;
        debug!(key, size, dest = %dest.display(), "Fetched object");
        Ok(size)
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let _guard = self.meta_lock.lock();
        let mut objects = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() != 1 || e.file_name() != INTERNAL_DIR);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !key.starts_with(prefix) {
                continue;
            }
            let meta = self.read_meta(&key)?;
            objects.push(ObjectInfo {
                key,
                size: meta.size,
                storage_class: meta.storage_class,
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn request_restore(&self, key: &str, days: u32, tier: RestoreTier) -> Result<RestoreRequest> {
        Self::validate_key(key)?;
        let _guard = self.meta_lock.lock();
        let mut meta = self.read_meta(key)?;
        if meta.storage_class != StorageClass::DeepArchive {
            return Ok(RestoreRequest::NotRequired);
        }
        match self.state_of(&meta) {
            RestoreState::InProgress => Ok(RestoreRequest::AlreadyInProgress),
            RestoreState::Ready => {
                if let Some(record) = meta.restore.as_mut() {
                    record.days = days;
                    record.extended_at = Some(Utc::now());
                }
                self.write_meta(key, &meta)?;
                info!(key, days, "Restore extended");
                Ok(RestoreRequest::Extended)
            }
            RestoreState::Archived => {
                meta.restore = Some(RestoreRecord {
                    requested_at: Utc::now(),
                    days,
                    tier,
                    extended_at: None,
                });
                self.write_meta(key, &meta)?;
                info!(key, days, ?tier, "Restore requested");
                Ok(RestoreRequest::Initiated)
            }
        }
    }

    fn restore_state(&self, key: &str) -> Result<RestoreState> {
        Self::validate_key(key)?;
        let _guard = self.meta_lock.lock();
        let meta = self.read_meta(key)?;
        Ok(self.state_of(&meta))
    }

    fn is_reachable(&self) -> bool {
        self.root.is_dir()
    }

    fn abort_incomplete_uploads(&self, _prefix: &str) -> Result<usize> {
        let mut aborted = 0;
        for entry in fs::read_dir(self.uploads_dir())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                aborted += 1;
            }
        }
        if aborted > 0 {
            info!(aborted, "Aborted incomplete uploads");
        }
        Ok(aborted)
    }
}
