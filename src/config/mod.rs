//! Runtime configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `GOALEDP__*` environment variables (highest precedence).

mod facade;
pub mod merge {
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod sources {
    pub mod environment;
}

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::concurrency::default_pool_size;
use crate::error::BrokerError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub explainer: ExplainerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.broker.cycle_delay_ms == 0 {
            return Err(BrokerError::ConfigError(
                "broker.cycle_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.pool.workers == Some(0) {
            return Err(BrokerError::ConfigError(
                "pool.workers must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Processing-cycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Delay between two processing cycles, in milliseconds
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,
}

fn default_cycle_delay_ms() -> u64 {
    500
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            cycle_delay_ms: default_cycle_delay_ms(),
        }
    }
}

/// Deliberation worker pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum concurrent deliberations; unset means twice the CPU count
    #[serde(default)]
    pub workers: Option<usize>,
}

impl PoolConfig {
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_pool_size)
    }
}

/// Explanation rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Normalize probability maps before presenting them
    #[serde(default = "default_true")]
    pub normalize: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            normalize: default_true(),
        }
    }
}
