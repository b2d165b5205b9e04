//! Defaults layer: the serialized `ColdsetConfig::default()`.

use crate::config::ColdsetConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with every default, so partial files only override what
/// they name.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&ColdsetConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
