//! Archive pipeline
//!
//! Two scoped threads joined by a rendezvous channel: the archiving stage
//! builds the archives of one set while the uploading stage pushes the
//! previous one. At most two jobs' archives exist in the buffer directory at
//! any time.

use super::job::{ArchiveJob, ArchiveMetrics, JobArtifacts};
use super::throughput::Throughput;
use super::PipelineReport;
use crate::archive::ArchiveBuilder;
use crate::error::{BackupError, Result};
use crate::retry::{retry, RetryPolicy};
use crate::sets::{self, SetDescriptor};
use crate::size::size_to_string;
use crate::store::{ObjectStore, RemoteLayout, RunDescriptor, StorageClass};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const MANIFEST_INFIX: &str = "list_contents";

pub struct ArchivePipeline<'a> {
    snapshot_root: PathBuf,
    buffer_dir: PathBuf,
    builder: &'a dyn ArchiveBuilder,
    store: &'a dyn ObjectStore,
    layout: RemoteLayout,
    label: Option<String>,
    retry: RetryPolicy,
    min_free_bytes: u64,
}

impl<'a> ArchivePipeline<'a> {
    pub fn new(
        snapshot_root: impl Into<PathBuf>,
        buffer_dir: impl Into<PathBuf>,
        builder: &'a dyn ArchiveBuilder,
        store: &'a dyn ObjectStore,
        layout: RemoteLayout,
    ) -> Self {
        Self {
            snapshot_root: snapshot_root.into(),
            buffer_dir: buffer_dir.into(),
            builder,
            store,
            layout,
            label: None,
            retry: RetryPolicy::default(),
            min_free_bytes: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    /// Archive and upload `sets` in order.
    pub fn run(&self, sets: Vec<SetDescriptor>) -> Result<PipelineReport> {
        let total = sets.len();
        if total == 0 {
            info!("No sets to upload");
            return Ok(PipelineReport::default());
        }
        fs::create_dir_all(&self.buffer_dir)?;
        self.check_free_space()?;

        let descriptor = RunDescriptor::new(&self.layout, self.label.clone(), self.builder.extension());
        retry(&self.retry, "upload run descriptor", || self.store.is_reachable(), |_| {
            descriptor.upload(self.store, &self.layout)
        })?;

        let total_bytes = sets.iter().map(|s| s.info.size_bytes).sum();
        info!(
            sets = total,
            total = %size_to_string(total_bytes),
            prefix = %self.layout.prefix(),
            "Starting upload"
        );

        let started = Instant::now();
        let (sender, receiver) = sync_channel::<ArchiveJob>(0);
        let outcome = thread::scope(|scope| {
            let producer = scope.spawn(move || self.produce(sets, sender));
            let consumer =
                scope.spawn(move || self.consume(receiver, total, total_bytes, started));
            let produced = producer
                .join()
                .map_err(|_| BackupError::WorkerPanicked("archive"));
            let consumed = consumer
                .join()
                .map_err(|_| BackupError::WorkerPanicked("upload"));
            produced??;
            consumed?
        });

        match self.store.abort_incomplete_uploads(&self.layout.prefix()) {
            Ok(aborted) => debug!(aborted, "Checked for incomplete uploads"),
            Err(e) => warn!(error = %e, "Failed to abort incomplete uploads"),
        }

        let report = outcome?;
        info!(
            total = report.total,
            uploaded = report.uploaded,
            failed = report.failed,
            "Upload finished"
        );
        Ok(report)
    }

    fn check_free_space(&self) -> Result<()> {
        let available = fs4::available_space(&self.buffer_dir)?;
        if available < self.min_free_bytes {
            return Err(BackupError::InsufficientSpace {
                path: self.buffer_dir.clone(),
                required: self.min_free_bytes,
                available,
            });
        }
        Ok(())
    }

    /// Archiving stage
    fn produce(&self, sets: Vec<SetDescriptor>, sender: SyncSender<ArchiveJob>) -> Result<()> {
        let total = sets.len();
        for (i, set) in sets.into_iter().enumerate() {
            let index = i + 1;
            info!("{}/{}: Packing set {}", index, total, set.stem);
            let job = self.build_job(index, set)?;
            if let Err(rejected) = sender.send(job) {
                debug!(set = %rejected.0.set.stem, "Upload stage stopped, dropping job");
                break;
            }
        }
        Ok(())
    }

    fn build_job(&self, index: usize, set: SetDescriptor) -> Result<ArchiveJob> {
        let ext = self.builder.extension();
        let mut artifacts = JobArtifacts::new();

        let archive_name = format!("{}.{}", set.stem, ext);
        let archive = artifacts.track(self.buffer_dir.join(&archive_name));
        let started = Instant::now();
        let entries = set.read_items()?;
        let archive_bytes = self
            .builder
            .build(&self.snapshot_root, &entries, &archive)?;
        let elapsed = started.elapsed();
        debug!(
            set = %set.stem,
            archive = %archive.display(),
            size = %size_to_string(archive_bytes),
            "Archive built"
        );

        let manifest = artifacts.track(
            self.buffer_dir
                .join(format!("{}.{}.txt", set.stem, MANIFEST_INFIX)),
        );
        fs::write(&manifest, format!("{}\n", set.list_file_name()))?;

        // The manifest archive packs exactly what the contents manifest names.
        let manifest_archive_name = format!("{}.{}.{}", set.stem, MANIFEST_INFIX, ext);
        let manifest_archive = artifacts.track(self.buffer_dir.join(&manifest_archive_name));
        let manifest_entries = sets::read_list(&manifest)?;
        self.builder
            .build(&set.dir, &manifest_entries, &manifest_archive)?;

        Ok(ArchiveJob {
            index,
            metrics: ArchiveMetrics {
                source_bytes: set.info.size_bytes,
                archive_bytes,
                elapsed,
            },
            set,
            archive,
            archive_name,
            manifest_archive,
            manifest_archive_name,
            artifacts,
        })
    }

    /// Uploading stage
    fn consume(
        &self,
        receiver: Receiver<ArchiveJob>,
        total: usize,
        total_bytes: u64,
        started: Instant,
    ) -> Result<PipelineReport> {
        let mut throughput = Throughput::new(total_bytes);
        let mut report = PipelineReport {
            total,
            ..PipelineReport::default()
        };

        for mut job in receiver {
            let metrics = job.metrics;
            throughput.record_archive(metrics.source_bytes, metrics.archive_bytes, metrics.elapsed);
            info!("{}", throughput.status_line(started.elapsed()));

            let outcome = self.upload_job(&job, total, &mut throughput, started);
            job.artifacts.cleanup()?;
            match outcome {
                Ok(()) => {
                    job.set.remove()?;
                    report.uploaded += 1;
                    info!(set = %job.set.stem, "Set uploaded");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(set = %job.set.stem, error = %e, "Upload failed, keeping set for the next run");
                }
            }
        }
        Ok(report)
    }

    /// Upload the manifest archive, then the main archive.
    fn upload_job(
        &self,
        job: &ArchiveJob,
        total: usize,
        throughput: &mut Throughput,
        started: Instant,
    ) -> Result<()> {
        let manifest_key = self.layout.key(&job.manifest_archive_name);
        let archive_key = self.layout.key(&job.archive_name);
        retry(&self.retry, "upload", || self.store.is_reachable(), |attempt| {
            info!(
                "{}/{}: Uploading {}, attempt {}",
                job.index, total, job.archive_name, attempt
            );
            let t0 = Instant::now();
            let result = upload_pair(
                self.store,
                (&manifest_key, &job.manifest_archive),
                (&archive_key, &job.archive),
            );
            if result.is_ok() {
                throughput.record_upload(
                    job.metrics.source_bytes,
                    job.metrics.archive_bytes,
                    t0.elapsed(),
                );
            }
            info!("{}", throughput.status_line(started.elapsed()));
            result
        })
    }
}

fn upload_pair(
    store: &dyn ObjectStore,
    manifest: (&str, &Path),
    archive: (&str, &Path),
) -> Result<()> {
    store.put(manifest.0, manifest.1, StorageClass::Standard)?;
    store.put(archive.0, archive.1, StorageClass::DeepArchive)
}
