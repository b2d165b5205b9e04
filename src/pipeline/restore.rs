//! Restore pipeline
//!
//! Requests a restore for every archived object of a generation, then runs a
//! poller and a downloader on scoped threads. The poller moves objects that
//! became readable into a bounded channel; the downloader fetches, unpacks
//! and deletes them.

use super::job::JobArtifacts;
use crate::archive::ArchiveExtractor;
use crate::error::{BackupError, Result};
use crate::retry::{retry, RetryPolicy};
use crate::store::{ObjectStore, RemoteLayout, RestoreRequest, RestoreState, RestoreTier, StorageClass};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Days a restored object stays readable
pub const DEFAULT_RESTORE_DAYS: u32 = 3;

const STOP_CHECK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub total: usize,
    pub restored: usize,
}

pub struct RestorePipeline<'a> {
    store: &'a dyn ObjectStore,
    extractor: &'a dyn ArchiveExtractor,
    layout: RemoteLayout,
    buffer_dir: PathBuf,
    extract_dir: PathBuf,
    days: u32,
    tier: RestoreTier,
    poll_interval: Duration,
    queue_depth: usize,
    retry: RetryPolicy,
}

impl<'a> RestorePipeline<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        extractor: &'a dyn ArchiveExtractor,
        layout: RemoteLayout,
        buffer_dir: impl Into<PathBuf>,
        extract_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            extractor,
            layout,
            buffer_dir: buffer_dir.into(),
            extract_dir: extract_dir.into(),
            days: DEFAULT_RESTORE_DAYS,
            tier: RestoreTier::default(),
            poll_interval: Duration::from_secs(60),
            queue_depth: 1,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn with_tier(mut self, tier: RestoreTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn run(&self) -> Result<RestoreReport> {
        let prefix = self.layout.prefix();
        let keys: Vec<String> = self
            .store
            .list(&prefix)?
            .into_iter()
            .filter(|o| o.storage_class == StorageClass::DeepArchive)
            .map(|o| o.key)
            .collect();
        if keys.is_empty() {
            return Err(BackupError::NothingToRestore(prefix));
        }
        fs::create_dir_all(&self.buffer_dir)?;
        fs::create_dir_all(&self.extract_dir)?;

        for key in &keys {
            let request = retry(&self.retry, "request restore", || self.store.is_reachable(), |_| {
                self.store.request_restore(key, self.days, self.tier)
            })?;
            match request {
                RestoreRequest::Initiated => info!(key = %key, tier = ?self.tier, "Requested restore"),
                RestoreRequest::AlreadyInProgress => info!(key = %key, "Restore already in progress"),
                RestoreRequest::Extended => info!(key = %key, days = self.days, "Restored copy extended"),
                RestoreRequest::NotRequired => debug!(key = %key, "Object is readable without restore"),
            }
        }

        let total = keys.len();
        let queued = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let (sender, receiver) = sync_channel::<String>(self.queue_depth);

        let restored = thread::scope(|scope| {
            let poller = scope.spawn(|| self.poll(keys, sender, &queued, &stop));
            let downloader = scope.spawn(|| {
                let result = self.download_all(receiver, total, &queued);
                if result.is_err() {
                    stop.store(true, Ordering::SeqCst);
                }
                result
            });
            let polled = poller
                .join()
                .map_err(|_| BackupError::WorkerPanicked("restore poller"));
            let downloaded = downloader
                .join()
                .map_err(|_| BackupError::WorkerPanicked("downloader"));
            let restored = downloaded??;
            polled??;
            Ok::<_, BackupError>(restored)
        })?;

        info!(total, restored, "Restore finished");
        Ok(RestoreReport { total, restored })
    }

    /// Poller: hand over objects as they become readable.
    fn poll(
        &self,
        mut pending: Vec<String>,
        sender: SyncSender<String>,
        queued: &AtomicUsize,
        stop: &AtomicBool,
    ) -> Result<()> {
        let mut last_counts = None;
        loop {
            let mut still_pending = Vec::with_capacity(pending.len());
            for key in pending {
                let state = retry(&self.retry, "restore status", || self.store.is_reachable(), |_| {
                    self.store.restore_state(&key)
                })?;
                if state == RestoreState::Ready {
                    queued.fetch_add(1, Ordering::SeqCst);
                    if sender.send(key).is_err() {
                        debug!("Downloader stopped, ending poll");
                        return Ok(());
                    }
                } else {
                    still_pending.push(key);
                }
            }
            pending = still_pending;

            let counts = (pending.len(), queued.load(Ordering::SeqCst));
            if last_counts != Some(counts) {
                info!("Remaining jobs: restores={}, downloads={}", counts.0, counts.1);
                last_counts = Some(counts);
            }
            if pending.is_empty() {
                return Ok(());
            }
            if !sleep_unless_stopped(self.poll_interval, stop) {
                debug!("Downloader stopped, ending poll");
                return Ok(());
            }
        }
    }

    /// Downloader: fetch, unpack and delete each ready object.
    fn download_all(
        &self,
        receiver: Receiver<String>,
        total: usize,
        queued: &AtomicUsize,
    ) -> Result<usize> {
        let mut restored = 0;
        for key in receiver {
            queued.fetch_sub(1, Ordering::SeqCst);
            let name = key.rsplit('/').next().unwrap_or(&key);
            let mut artifacts = JobArtifacts::new();
            let download = artifacts.track(self.buffer_dir.join(name));

            retry(&self.retry, "download", || self.store.is_reachable(), |attempt| {
                info!(
                    "{}/{}: Downloading {}, attempt {}",
                    restored + 1,
                    total,
                    key,
                    attempt
                );
                self.store.get(&key, &download)
            })?;
            self.extractor.unpack(&download, &self.extract_dir)?;
            artifacts.cleanup()?;
            restored += 1;
        }
        Ok(restored)
    }
}

/// Sleep for `duration`, returning early (with `false`) once `stop` is set.
fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STOP_CHECK.min(deadline - now));
    }
}
