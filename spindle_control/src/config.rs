//! TOML configuration loader with validation.
//!
//! Loads a [`SpindleUnitConfig`] and runs the structural checks. Problems that
//! only disable one tool (short speed map, zero frequency, ramp bounds) are
//! not rejected here; the tool records them as faults when it is built.

use std::path::Path;

use spindle_common::config::{ConfigError, ConfigLoader};
use spindle_common::spindle::config::SpindleUnitConfig;
use tracing::{info, warn};

/// Load and validate the unit configuration from `path`.
pub fn load_config(path: &Path) -> Result<SpindleUnitConfig, ConfigError> {
    let config = SpindleUnitConfig::load(path)?;
    finish(config)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(content: &str) -> Result<SpindleUnitConfig, ConfigError> {
    let config = SpindleUnitConfig::from_toml_str(content)?;
    finish(config)
}

fn finish(config: SpindleUnitConfig) -> Result<SpindleUnitConfig, ConfigError> {
    config.validate()?;
    if config.tools.is_empty() {
        warn!("configuration defines no spindles");
    }
    info!(
        service = %config.shared.service_name,
        tools = config.tools.len(),
        "spindle configuration loaded"
    );
    Ok(config)
}
