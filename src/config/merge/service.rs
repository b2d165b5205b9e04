//! MergeService: orchestrates sources and deserializes to ColdsetConfig.

use crate::config::sources::{environment, global_file};
use crate::config::ColdsetConfig;
use config::{ConfigError, File};
use std::path::Path;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> explicit file ->
    /// environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<ColdsetConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Defaults plus a single file, without global file or environment.
    pub fn load_file_only(path: &Path) -> Result<ColdsetConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
