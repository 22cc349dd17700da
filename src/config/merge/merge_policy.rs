//! Merge rules: built-in defaults are the lowest-precedence source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the default logging settings applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
