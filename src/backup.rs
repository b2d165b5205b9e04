//! Backup orchestration
//!
//! Wires the stages together for the CLI: inclusion matching, crawl,
//! checkpoint, partition and set writing, then the upload and restore
//! pipelines.

use crate::archive::TarGzArchive;
use crate::config::ColdsetConfig;
use crate::error::{BackupError, Result};
use crate::matcher::{self, MatchOutcome};
use crate::partition::{Inclusions, PlannedSet, SetPartitioner};
use crate::pipeline::{ArchivePipeline, PipelineReport, RestorePipeline, RestoreReport};
use crate::sets::{self, writer::SetWriter, SetDescriptor};
use crate::size::size_to_string;
use crate::store::{LocalObjectStore, RemoteLayout};
use crate::tree::checkpoint;
use crate::tree::{CrawlOutcome, Tree, TreeCrawler};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of a scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub inclusion_paths: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub files: u64,
    pub bytes: u64,
    /// Sealed directories left out of the crawl
    pub skipped: Vec<PathBuf>,
    pub sets: Vec<SetDescriptor>,
}

/// Outcome of a dry scan: the sets a scan would write
#[derive(Debug, Default)]
pub struct DryScanReport {
    pub inclusion_paths: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub files: u64,
    pub bytes: u64,
    pub sets: Vec<PlannedSet>,
}

/// Expand the configured inclusion patterns.
///
/// When a pattern matched nothing and `ignore_warnings` is off, `confirm`
/// decides whether to go on.
pub fn match_inclusions(
    config: &ColdsetConfig,
    confirm: impl FnOnce(&MatchOutcome) -> Result<bool>,
) -> Result<MatchOutcome> {
    let outcome = matcher::expand(&config.snapshot.path, &config.snapshot.include)?;
    if outcome.has_warnings() && !config.ignore_warnings && !confirm(&outcome)? {
        return Err(BackupError::Aborted(format!(
            "{} inclusion pattern(s) matched nothing",
            outcome.warnings.len()
        )));
    }
    if outcome.paths.is_empty() {
        return Err(BackupError::Aborted(
            "No inclusion path exists below the snapshot root".to_string(),
        ));
    }
    Ok(outcome)
}

fn crawl(config: &ColdsetConfig, inclusion_paths: &[PathBuf]) -> Result<CrawlOutcome> {
    TreeCrawler::new(&config.snapshot.path, config.sets.upload_limit())
        .with_seal_policy(config.snapshot.seal_policy)
        .crawl(inclusion_paths)
}

/// Match, crawl, checkpoint, partition and write sets.
pub fn scan(
    config: &ColdsetConfig,
    confirm: impl FnOnce(&MatchOutcome) -> Result<bool>,
) -> Result<ScanReport> {
    let matched = match_inclusions(config, confirm)?;
    let crawled = crawl(config, &matched.paths)?;

    let state_file = config.sets.state_file_path()?;
    checkpoint::save(&state_file, &crawled.tree, &matched.paths)?;

    let sets = write_sets(config, &crawled.tree, &matched.paths)?;
    Ok(ScanReport {
        inclusion_paths: matched.paths,
        warnings: matched.warnings,
        files: crawled.files.walk,
        bytes: crawled.bytes.walk,
        skipped: crawled.skipped,
        sets,
    })
}

/// Partition a previously saved crawl without walking the snapshot again.
pub fn partition_from_checkpoint(config: &ColdsetConfig) -> Result<Vec<SetDescriptor>> {
    let state_file = config.sets.state_file_path()?;
    let loaded = checkpoint::load(&state_file)?;
    let limit = config.sets.upload_limit();
    if loaded.tree.size_limit() != limit {
        return Err(BackupError::ConfigError(format!(
            "Checkpoint {} was crawled with upload limit {}, configured limit is {}; rescan",
            state_file.display(),
            size_to_string(loaded.tree.size_limit()),
            size_to_string(limit)
        )));
    }
    if loaded.tree.snapshot_root() != config.snapshot.path {
        warn!(
            checkpoint = %loaded.tree.snapshot_root().display(),
            configured = %config.snapshot.path.display(),
            "Checkpoint was taken from a different snapshot path"
        );
    }
    write_sets(config, &loaded.tree, &loaded.inclusion_paths)
}

/// Crawl and partition without writing anything.
pub fn dry_scan(
    config: &ColdsetConfig,
    confirm: impl FnOnce(&MatchOutcome) -> Result<bool>,
) -> Result<DryScanReport> {
    let matched = match_inclusions(config, confirm)?;
    let crawled = crawl(config, &matched.paths)?;
    let sets = SetPartitioner::new(&crawled.tree, Inclusions::new(matched.paths.clone())).partition();
    Ok(DryScanReport {
        inclusion_paths: matched.paths,
        warnings: matched.warnings,
        files: crawled.files.walk,
        bytes: crawled.bytes.walk,
        sets,
    })
}

fn write_sets(
    config: &ColdsetConfig,
    tree: &Tree,
    inclusion_paths: &[PathBuf],
) -> Result<Vec<SetDescriptor>> {
    let existing = sets::discover(&config.sets.path)?;
    if !existing.is_empty() {
        warn!(
            count = existing.len(),
            path = %config.sets.path.display(),
            "Set directory still holds sets from an earlier run"
        );
    }

    let planned = SetPartitioner::new(tree, Inclusions::new(inclusion_paths.to_vec())).partition();
    let writer = SetWriter::new(&config.sets.path, config.snapshot.label.clone());
    let mut written = Vec::with_capacity(planned.len());
    for set in &planned {
        written.push(writer.write(set)?);
    }
    info!(
        sets = written.len(),
        path = %config.sets.path.display(),
        "Wrote sets"
    );
    Ok(written)
}

/// Generation identifier for a new upload run.
pub fn default_generation() -> String {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

fn open_store(config: &ColdsetConfig) -> Result<LocalObjectStore> {
    Ok(LocalObjectStore::new(&config.remote.store_path)?
        .with_restore_delay(Duration::from_secs(config.remote.restore_delay_secs)))
}

/// Archive and upload every set in the set directory.
///
/// Returns the report together with the generation it was uploaded under.
pub fn upload(config: &ColdsetConfig) -> Result<(PipelineReport, String)> {
    let generation = config
        .remote
        .generation
        .clone()
        .unwrap_or_else(default_generation);
    let store = open_store(config)?;
    let builder = TarGzArchive::new().with_compression_level(config.pipeline.compression_level);
    let layout = RemoteLayout::new(&config.remote.bucket_dir, &generation);

    let sets = sets::discover(&config.sets.path)?;
    let report = ArchivePipeline::new(
        &config.snapshot.path,
        &config.pipeline.buffer_path,
        &builder,
        &store,
        layout,
    )
    .with_retry(config.pipeline.retry_policy())
    .with_label(config.snapshot.label.clone())
    .with_min_free_bytes(config.required_buffer_space())
    .run(sets)?;
    Ok((report, generation))
}

/// Restore every archive of `generation` into the extract directory.
pub fn restore(config: &ColdsetConfig, generation: Option<&str>) -> Result<RestoreReport> {
    let generation = generation
        .map(str::to_string)
        .or_else(|| config.remote.generation.clone())
        .ok_or_else(|| {
            BackupError::ConfigError(
                "restore needs a generation (--generation or remote.generation)".to_string(),
            )
        })?;
    let store = open_store(config)?;
    let extractor = TarGzArchive::new();
    let layout = RemoteLayout::new(&config.remote.bucket_dir, &generation);

    RestorePipeline::new(
        &store,
        &extractor,
        layout,
        &config.pipeline.buffer_path,
        &config.restore.extract_path,
    )
    .with_days(config.restore.days)
    .with_tier(config.restore.tier)
    .with_poll_interval(Duration::from_secs(config.restore.poll_interval_secs))
    .with_queue_depth(config.restore.queue_depth)
    .with_retry(config.pipeline.retry_policy())
    .run()
}
