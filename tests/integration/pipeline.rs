//! Archive pipeline: ordering, failure handling, cleanup and outages.

use super::support::{build_tree, fast_retry, list_tree, ScriptedStore};
use coldset::archive::{ArchiveExtractor, TarGzArchive};
use coldset::error::BackupError;
use coldset::partition::{Inclusions, SetPartitioner};
use coldset::pipeline::{ArchivePipeline, PipelineReport};
use coldset::retry::RetryPolicy;
use coldset::sets::{self, writer::SetWriter};
use coldset::store::{ObjectStore, RemoteLayout, StorageClass};
use coldset::tree::TreeCrawler;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
    store: ScriptedStore,
}

impl Fixture {
    /// Snapshot with two top-level directories that each fill a set.
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("snap");
        build_tree(&snapshot, &[("alpha/1", 6), ("beta/2", 6), ("beta/empty/", 0)]);

        let crawled = TreeCrawler::new(&snapshot, 10)
            .crawl(&[PathBuf::new()])
            .unwrap();
        let writer = SetWriter::new(temp.path().join("sets"), None);
        for set in SetPartitioner::new(&crawled.tree, Inclusions::new(vec![PathBuf::new()])).partition() {
            writer.write(&set).unwrap();
        }

        let store = ScriptedStore::new(temp.path().join("bucket"));
        Self { temp, store }
    }

    fn sets_dir(&self) -> PathBuf {
        self.temp.path().join("sets")
    }

    fn buffer_dir(&self) -> PathBuf {
        self.temp.path().join("buffer")
    }

    fn run(&self, retry: RetryPolicy) -> Result<PipelineReport, BackupError> {
        let builder = TarGzArchive::new();
        ArchivePipeline::new(
            self.temp.path().join("snap"),
            self.buffer_dir(),
            &builder,
            &self.store,
            RemoteLayout::new("backups", "g1"),
        )
        .with_retry(retry)
        .run(sets::discover(&self.sets_dir()).unwrap())
    }
}

#[test]
fn manifest_is_uploaded_before_main_archive() {
    let fx = Fixture::new();
    let report = fx.run(fast_retry(3)).unwrap();

    assert_eq!(
        report,
        PipelineReport {
            total: 2,
            uploaded: 2,
            failed: 0
        }
    );
    assert_eq!(
        fx.store.put_keys(),
        vec![
            "backups/g1/restore.json",
            "backups/g1/alpha_000.list_contents.tar.gz",
            "backups/g1/alpha_000.tar.gz",
            "backups/g1/beta_000.list_contents.tar.gz",
            "backups/g1/beta_000.tar.gz",
        ]
    );
    let classes: Vec<StorageClass> = fx.store.puts.lock().iter().map(|p| p.class).collect();
    assert_eq!(
        classes,
        vec![
            StorageClass::Standard,
            StorageClass::Standard,
            StorageClass::DeepArchive,
            StorageClass::Standard,
            StorageClass::DeepArchive,
        ]
    );
    assert!(sets::discover(&fx.sets_dir()).unwrap().is_empty());
    assert!(list_tree(&fx.buffer_dir()).is_empty());
}

#[test]
fn manifest_archive_carries_the_set_list() {
    let fx = Fixture::new();
    fx.run(fast_retry(1)).unwrap();

    let fetched = fx.temp.path().join("manifest.tar.gz");
    fx.store
        .get("backups/g1/alpha_000.list_contents.tar.gz", &fetched)
        .unwrap();
    let unpacked = fx.temp.path().join("manifest");
    TarGzArchive::new().unpack(&fetched, &unpacked).unwrap();
    assert_eq!(list_tree(&unpacked), vec!["alpha_000.list"]);
    assert_eq!(
        std::fs::read_to_string(unpacked.join("alpha_000.list")).unwrap(),
        "alpha\n"
    );
}

#[test]
fn failed_upload_keeps_set_and_removes_archives() {
    let fx = Fixture::new();
    *fx.store.fail_keys_containing.lock() = Some("beta_000.tar.gz".to_string());

    let report = fx.run(fast_retry(2)).unwrap();
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.is_success());

    let remaining: Vec<String> = sets::discover(&fx.sets_dir())
        .unwrap()
        .into_iter()
        .map(|s| s.stem)
        .collect();
    assert_eq!(remaining, vec!["beta_000"]);
    assert!(list_tree(&fx.buffer_dir()).is_empty());

    // Manifest then main archive, twice.
    let beta_puts = fx
        .store
        .put_keys()
        .into_iter()
        .filter(|k| k.contains("beta_000"))
        .count();
    assert_eq!(beta_puts, 4);
}

#[test]
fn transient_failures_are_retried() {
    let fx = Fixture::new();
    fx.store.transient_failures.store(2, Ordering::SeqCst);

    let report = fx.run(fast_retry(3)).unwrap();
    assert!(report.is_success());
    assert_eq!(report.uploaded, 2);
}

#[test]
fn outage_wait_does_not_consume_attempts() {
    let fx = Fixture::new();
    fx.store.offline.store(true, Ordering::SeqCst);
    fx.store.offline_checks.store(3, Ordering::SeqCst);

    // A single attempt only suffices if waiting for connectivity is free.
    let report = fx.run(fast_retry(1)).unwrap();
    assert!(report.is_success());
    assert!(!fx.store.offline.load(Ordering::SeqCst));
}

#[test]
fn empty_set_directory_uploads_nothing() {
    let temp = TempDir::new().unwrap();
    let store = ScriptedStore::new(temp.path().join("bucket"));
    let builder = TarGzArchive::new();
    let report = ArchivePipeline::new(
        temp.path(),
        temp.path().join("buffer"),
        &builder,
        &store,
        RemoteLayout::new("", "g1"),
    )
    .run(Vec::new())
    .unwrap();
    assert_eq!(report, PipelineReport::default());
    assert!(store.put_keys().is_empty());
}

#[test]
fn insufficient_buffer_space_fails_before_upload() {
    let fx = Fixture::new();
    let builder = TarGzArchive::new();
    let result = ArchivePipeline::new(
        fx.temp.path().join("snap"),
        fx.buffer_dir(),
        &builder,
        &fx.store,
        RemoteLayout::new("", "g1"),
    )
    .with_min_free_bytes(u64::MAX)
    .run(sets::discover(&fx.sets_dir()).unwrap());

    assert!(matches!(result, Err(BackupError::InsufficientSpace { .. })));
    assert!(fx.store.put_keys().is_empty());
    assert_eq!(sets::discover(&fx.sets_dir()).unwrap().len(), 2);
}

#[test]
fn uploaded_objects_are_listed_under_generation() {
    let fx = Fixture::new();
    fx.run(fast_retry(1)).unwrap();
    let deep: Vec<String> = fx
        .store
        .list("backups/g1/")
        .unwrap()
        .into_iter()
        .filter(|o| o.storage_class == StorageClass::DeepArchive)
        .map(|o| o.name().to_string())
        .collect();
    assert_eq!(deep, vec!["alpha_000.tar.gz", "beta_000.tar.gz"]);
}
