//! Shared fixtures: snapshot trees, fast retry policies and a scripted store.

use coldset::error::{BackupError, Result};
use coldset::retry::RetryPolicy;
use coldset::store::{
    LocalObjectStore, ObjectInfo, ObjectStore, RestoreRequest, RestoreState, RestoreTier,
    StorageClass,
};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Serializes tests that modify process-wide environment variables.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Run `f` with XDG directories pointing into `temp`.
pub fn with_xdg_env<F, R>(temp: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> = ["XDG_CONFIG_HOME", "XDG_DATA_HOME"]
        .into_iter()
        .map(|key| (key, std::env::var(key).ok()))
        .collect();
    std::env::set_var("XDG_CONFIG_HOME", temp.path().join("config"));
    std::env::set_var("XDG_DATA_HOME", temp.path().join("data"));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (key, value) in saved {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Create files (with `size` bytes each) and empty directories below `root`.
///
/// Paths ending in `/` are created as directories.
pub fn build_tree(root: &Path, entries: &[(&str, usize)]) {
    fs::create_dir_all(root).unwrap();
    for (path, size) in entries {
        let full = root.join(path.trim_end_matches('/'));
        if path.ends_with('/') {
            fs::create_dir_all(&full).unwrap();
        } else {
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            let content: Vec<u8> = (0..*size).map(|i| (i % 251) as u8).collect();
            fs::write(&full, content).unwrap();
        }
    }
}

/// Every file and directory below `root`, relative, sorted.
pub fn list_tree(root: &Path) -> Vec<String> {
    let mut out: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| {
            let e = e.unwrap();
            let rel = e.path().strip_prefix(root).unwrap().display().to_string();
            if e.file_type().is_dir() {
                format!("{}/", rel)
            } else {
                rel
            }
        })
        .collect();
    out.sort();
    out
}

pub fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        delay: Duration::ZERO,
        connectivity_poll: Duration::from_millis(1),
    }
}

/// One observed `put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub key: String,
    pub class: StorageClass,
}

/// Wraps a [`LocalObjectStore`], records puts and injects failures.
pub struct ScriptedStore {
    pub inner: LocalObjectStore,
    pub puts: Mutex<Vec<PutRecord>>,
    /// Puts whose key contains this string fail with a transport error
    pub fail_keys_containing: Mutex<Option<String>>,
    /// The next N puts fail with a transport error
    pub transient_failures: AtomicUsize,
    /// While set, puts fail and the store reports itself unreachable
    pub offline: AtomicBool,
    /// Reachability checks left before the store comes back online
    pub offline_checks: AtomicUsize,
}

impl ScriptedStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            inner: LocalObjectStore::new(root).unwrap(),
            puts: Mutex::new(Vec::new()),
            fail_keys_containing: Mutex::new(None),
            transient_failures: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
            offline_checks: AtomicUsize::new(0),
        }
    }

    pub fn put_keys(&self) -> Vec<String> {
        self.puts.lock().iter().map(|p| p.key.clone()).collect()
    }
}

impl ObjectStore for ScriptedStore {
    fn put(&self, key: &str, source: &Path, class: StorageClass) -> Result<()> {
        self.puts.lock().push(PutRecord {
            key: key.to_string(),
            class,
        });
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackupError::transport("put", "network unreachable"));
        }
        if let Some(pattern) = self.fail_keys_containing.lock().as_deref() {
            if key.contains(pattern) {
                return Err(BackupError::transport("put", "injected failure"));
            }
        }
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(BackupError::transport("put", "connection reset"));
        }
        self.inner.put(key, source, class)
    }

    fn get(&self, key: &str, dest: &Path) -> Result<u64> {
        self.inner.get(key, dest)
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.inner.list(prefix)
    }

    fn request_restore(&self, key: &str, days: u32, tier: RestoreTier) -> Result<RestoreRequest> {
        self.inner.request_restore(key, days, tier)
    }

    fn restore_state(&self, key: &str) -> Result<RestoreState> {
        self.inner.restore_state(key)
    }

    fn is_reachable(&self) -> bool {
        if !self.offline.load(Ordering::SeqCst) {
            return true;
        }
        let left = self.offline_checks.load(Ordering::SeqCst);
        if left == 0 {
            self.offline.store(false, Ordering::SeqCst);
            return true;
        }
        self.offline_checks.store(left - 1, Ordering::SeqCst);
        false
    }

    fn abort_incomplete_uploads(&self, prefix: &str) -> Result<usize> {
        self.inner.abort_incomplete_uploads(prefix)
    }
}
