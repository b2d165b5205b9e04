//! Global config file source: `$XDG_CONFIG_HOME/coldset/config.toml`, optional.

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use tracing::debug;

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg::global_config_path() {
        Ok(path) => {
            debug!(path = %path.display(), "Global config file");
            Ok(builder.add_source(File::from(path).required(false)))
        }
        Err(_) => Ok(builder),
    }
}
