//! Scan, upload and restore through the orchestration layer.

use super::support::{build_tree, list_tree};
use coldset::backup;
use coldset::config::ColdsetConfig;
use coldset::sets;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn config(temp: &Path) -> ColdsetConfig {
    let mut config = ColdsetConfig::default();
    config.snapshot.path = temp.join("snap");
    config.snapshot.include = vec!["projects".to_string(), "photos/*".to_string()];
    config.snapshot.label = Some("tank".to_string());
    config.sets.path = temp.join("sets");
    config.sets.state_file = Some(temp.join("state/tree.bin"));
    config.sets.upload_limit_bytes = Some(4096);
    config.remote.store_path = temp.join("bucket");
    config.remote.bucket_dir = "/backups/".to_string();
    config.pipeline.buffer_path = temp.join("buffer");
    config.pipeline.retry_delay_ms = 0;
    config.restore.extract_path = temp.join("restore");
    config.restore.poll_interval_secs = 1;
    config
}

#[test]
fn restored_tree_matches_included_source() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());
    build_tree(
        &config.snapshot.path,
        &[
            ("projects/coldset/src/main.rs", 3000),
            ("projects/coldset/README", 1500),
            ("projects/scratch/", 0),
            ("photos/2023/a.jpg", 2500),
            ("photos/2024/b.jpg", 2500),
            ("tmp/ignored", 100),
        ],
    );
    #[cfg(unix)]
    std::os::unix::fs::symlink("coldset/README", config.snapshot.path.join("projects/readme")).unwrap();

    let scanned = backup::scan(&config, |_| panic!("every pattern matches")).unwrap();
    assert!(scanned.sets.len() >= 3);
    assert!(scanned.sets.iter().all(|s| s.info.size_bytes <= 4096));
    assert!(scanned.sets.iter().all(|s| s.stem.starts_with("tank")));

    let (report, generation) = backup::upload(&config).unwrap();
    assert!(report.is_success());
    assert_eq!(report.uploaded, scanned.sets.len());
    assert!(sets::discover(&config.sets.path).unwrap().is_empty());

    let restored = backup::restore(&config, Some(&generation)).unwrap();
    assert_eq!(restored.restored, scanned.sets.len());

    let mut expected = list_tree(&config.snapshot.path);
    expected.retain(|p| !p.starts_with("tmp"));
    assert_eq!(list_tree(&config.restore.extract_path), expected);
    assert_eq!(
        fs::read(config.restore.extract_path.join("photos/2024/b.jpg")).unwrap(),
        fs::read(config.snapshot.path.join("photos/2024/b.jpg")).unwrap()
    );
    #[cfg(unix)]
    assert_eq!(
        fs::read_link(config.restore.extract_path.join("projects/readme")).unwrap(),
        Path::new("coldset/README")
    );
}

#[test]
fn interrupted_partition_resumes_from_checkpoint() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());
    build_tree(
        &config.snapshot.path,
        &[("projects/a", 3000), ("projects/b", 3000), ("photos/x/1", 10)],
    );

    let scanned = backup::scan(&config, |_| Ok(true)).unwrap();
    let stems: Vec<String> = scanned.sets.iter().map(|s| s.stem.clone()).collect();
    for set in scanned.sets {
        set.remove().unwrap();
    }
    // The snapshot may change; the checkpoint still holds the crawled state.
    fs::remove_file(config.snapshot.path.join("projects/a")).unwrap();

    let resumed = backup::partition_from_checkpoint(&config).unwrap();
    let resumed: Vec<String> = resumed.into_iter().map(|s| s.stem).collect();
    assert_eq!(resumed, stems);
}
