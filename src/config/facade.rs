//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::RuntimeConfig;
use crate::error::BrokerError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration, from `path` when given, otherwise from the default
    /// file and the environment. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<RuntimeConfig, BrokerError> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => MergeService::load().map_err(to_broker_error)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<RuntimeConfig, BrokerError> {
        MergeService::load_from_file(path).map_err(to_broker_error)
    }

    /// Create default configuration.
    pub fn default() -> RuntimeConfig {
        RuntimeConfig::default()
    }
}

fn to_broker_error(err: config::ConfigError) -> BrokerError {
    BrokerError::ConfigError(err.to_string())
}
