//! Transfer pipelines between the set directory and the object store.

pub mod archive;
pub mod job;
pub mod restore;
pub mod throughput;

pub use archive::ArchivePipeline;
pub use restore::{RestorePipeline, RestoreReport};
pub use throughput::Throughput;

/// Outcome of an archive pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub total: usize,
    pub uploaded: usize,
    pub failed: usize,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
