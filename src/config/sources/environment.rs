//! Environment variable source: GOALEDP__* prefix with __ separator

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, Map};

pub const PREFIX: &str = "GOALEDP";

/// Add the environment overlay to a builder.
///
/// `GOALEDP__BROKER__CYCLE_DELAY_MS=100` sets `broker.cycle_delay_ms`. When
/// `vars` is given it replaces the process environment.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    vars: Option<Map<String, String>>,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(vars),
    )
}
