//! Configuration System
//!
//! Layered configuration for the context store: built-in defaults, the user's global
//! config file, an optional explicit file, then `CONTEXTSTORE_*` environment
//! variables.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
}

pub use sources::global_file::global_config_path;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "CONTEXTSTORE";
/// Engine client config directory; the store lives in its `contexts` subdirectory
pub const ENV_DOCKER_CONFIG: &str = "DOCKER_CONFIG";
pub const CONTEXTS_DIR: &str = "contexts";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store root; derived from the environment when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolve the store root: `storage.dir`, else `$DOCKER_CONFIG/contexts`, else
    /// `~/.docker/contexts`.
    pub fn store_dir(&self) -> Result<PathBuf, ConfigError> {
        self.store_dir_with(|k| std::env::var(k).ok())
    }

    pub fn store_dir_with<F>(&self, env: F) -> Result<PathBuf, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = &self.storage.dir {
            return Ok(dir.clone());
        }
        if let Some(docker_config) = env(ENV_DOCKER_CONFIG).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(docker_config).join(CONTEXTS_DIR));
        }
        let dirs = directories::BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(dirs.home_dir().join(".docker").join(CONTEXTS_DIR))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.storage.dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("storage.dir cannot be empty".to_string()));
            }
        }
        self.logging.validate()
    }
}

/// Loads [`StoreConfig`] from all sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, environment.
    pub fn load() -> Result<StoreConfig, ConfigError> {
        Self::build(None)
    }

    /// Defaults, global file, `path`, environment. `path` must exist.
    pub fn load_from_file(path: &Path) -> Result<StoreConfig, ConfigError> {
        Self::build(Some(path))
    }

    pub fn default() -> StoreConfig {
        StoreConfig::default()
    }

    fn build(path: Option<&Path>) -> Result<StoreConfig, ConfigError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );
        let config: StoreConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
