//! Environment variable source: COLDSET__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "COLDSET";

/// Add environment variable overlay to builder.
///
/// `COLDSET__PIPELINE__RETRY_ATTEMPTS=5` sets `pipeline.retry_attempts`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    ))
}
