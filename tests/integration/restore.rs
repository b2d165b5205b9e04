//! Restore pipeline against the filesystem store with simulated latency.

use super::support::{build_tree, fast_retry, list_tree};
use coldset::archive::TarGzArchive;
use coldset::error::BackupError;
use coldset::partition::{Inclusions, SetPartitioner};
use coldset::pipeline::{ArchivePipeline, RestorePipeline};
use coldset::sets::{self, writer::SetWriter};
use coldset::store::{
    LocalObjectStore, ObjectStore, RemoteLayout, RestoreRequest, RestoreState, RestoreTier,
    StorageClass,
};
use coldset::tree::TreeCrawler;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DELAY: Duration = Duration::from_millis(300);

fn backup(temp: &Path, store: &LocalObjectStore, generation: &str) -> PathBuf {
    let snapshot = temp.join("snap");
    build_tree(
        &snapshot,
        &[("music/a.flac", 40), ("music/b.flac", 40), ("notes/todo", 5), ("notes/old/", 0)],
    );
    let crawled = TreeCrawler::new(&snapshot, 64).crawl(&[PathBuf::new()]).unwrap();
    let writer = SetWriter::new(temp.join("sets"), None);
    for set in SetPartitioner::new(&crawled.tree, Inclusions::new(vec![PathBuf::new()])).partition() {
        writer.write(&set).unwrap();
    }

    let builder = TarGzArchive::new();
    let report = ArchivePipeline::new(
        &snapshot,
        temp.join("buffer"),
        &builder,
        store,
        RemoteLayout::new("", generation),
    )
    .with_retry(fast_retry(1))
    .run(sets::discover(&temp.join("sets")).unwrap())
    .unwrap();
    assert!(report.is_success());
    snapshot
}

#[test]
fn objects_become_ready_after_the_restore_delay() {
    let temp = TempDir::new().unwrap();
    let store = LocalObjectStore::new(temp.path().join("bucket"))
        .unwrap()
        .with_restore_delay(DELAY);
    let snapshot = backup(temp.path(), &store, "g1");
    let extract = temp.path().join("restore");

    let started = Instant::now();
    let extractor = TarGzArchive::new();
    let report = RestorePipeline::new(
        &store,
        &extractor,
        RemoteLayout::new("", "g1"),
        temp.path().join("buffer"),
        &extract,
    )
    .with_poll_interval(Duration::from_millis(50))
    .with_queue_depth(2)
    .with_retry(fast_retry(1))
    .run()
    .unwrap();

    assert!(started.elapsed() >= DELAY);
    assert_eq!(report.total, report.restored);
    assert!(report.total >= 2);
    assert_eq!(list_tree(&extract), list_tree(&snapshot));
    assert_eq!(
        fs::read(extract.join("music/b.flac")).unwrap(),
        fs::read(snapshot.join("music/b.flac")).unwrap()
    );
    assert!(list_tree(&temp.path().join("buffer")).is_empty());
}

#[test]
fn repeated_restore_requests_are_accepted() {
    let temp = TempDir::new().unwrap();
    let store = LocalObjectStore::new(temp.path().join("bucket")).unwrap();
    backup(temp.path(), &store, "g1");
    let extractor = TarGzArchive::new();

    for round in 0..2 {
        let extract = temp.path().join(format!("restore{round}"));
        let report = RestorePipeline::new(
            &store,
            &extractor,
            RemoteLayout::new("", "g1"),
            temp.path().join("buffer"),
            &extract,
        )
        .with_poll_interval(Duration::from_millis(10))
        .with_retry(fast_retry(1))
        .run()
        .unwrap();
        assert_eq!(report.total, report.restored);
    }

    let key = store
        .list("g1/")
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .find(|k| k.ends_with(".tar.gz") && !k.contains("list_contents"))
        .unwrap();
    assert_eq!(store.restore_state(&key).unwrap(), RestoreState::Ready);
}

#[test]
fn unknown_generation_has_nothing_to_restore() {
    let temp = TempDir::new().unwrap();
    let store = LocalObjectStore::new(temp.path().join("bucket")).unwrap();
    let extractor = TarGzArchive::new();
    let result = RestorePipeline::new(
        &store,
        &extractor,
        RemoteLayout::new("backups", "missing"),
        temp.path().join("buffer"),
        temp.path().join("restore"),
    )
    .run();
    match result {
        Err(BackupError::NothingToRestore(prefix)) => assert_eq!(prefix, "backups/missing/"),
        other => panic!("expected NothingToRestore, got {:?}", other),
    }
}

#[test]
fn restored_copies_expire_unless_requested_again() {
    let temp = TempDir::new().unwrap();
    let store = LocalObjectStore::new(temp.path().join("bucket"))
        .unwrap()
        .with_restore_day(Duration::from_millis(400));
    let source = temp.path().join("object");
    fs::write(&source, "cold").unwrap();
    let key = "g1/set_000.tar.gz";
    store.put(key, &source, StorageClass::DeepArchive).unwrap();

    assert_eq!(
        store.request_restore(key, 1, RestoreTier::Bulk).unwrap(),
        RestoreRequest::Initiated
    );
    assert_eq!(store.restore_state(key).unwrap(), RestoreState::Ready);

    thread::sleep(Duration::from_millis(300));
    assert_eq!(
        store.request_restore(key, 1, RestoreTier::Bulk).unwrap(),
        RestoreRequest::Extended
    );

    // Past the first expiry, inside the extended one.
    thread::sleep(Duration::from_millis(200));
    assert_eq!(store.restore_state(key).unwrap(), RestoreState::Ready);

    thread::sleep(Duration::from_millis(400));
    assert_eq!(store.restore_state(key).unwrap(), RestoreState::Archived);
    assert!(matches!(
        store.get(key, &temp.path().join("out")),
        Err(BackupError::NotRestored(_))
    ));
    assert_eq!(
        store.request_restore(key, 1, RestoreTier::Bulk).unwrap(),
        RestoreRequest::Initiated
    );
}
