//! MergeService: orchestrates sources and deserializes to RuntimeConfig.

use crate::config::sources::environment;
use crate::config::{xdg, RuntimeConfig};
use config::{Config, ConfigError, File, FileFormat, Map};
use std::path::Path;
use tracing::debug;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from the default file (if present) and the environment.
    /// Precedence: defaults (lowest) -> user config file -> environment (highest).
    pub fn load() -> Result<RuntimeConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = xdg::default_config_file() {
            debug!(path = %path.display(), "Looking for default config file");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        let builder = environment::add_to_builder(builder, None);
        builder.build()?.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<RuntimeConfig, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Load from a file, overlaying the given variables instead of the process
    /// environment when `vars` is set.
    pub fn load_with_env(
        path: &Path,
        vars: Option<Map<String, String>>,
    ) -> Result<RuntimeConfig, ConfigError> {
        let builder = Config::builder().add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(true),
        );
        let builder = environment::add_to_builder(builder, vars);
        builder.build()?.try_deserialize()
    }
}
