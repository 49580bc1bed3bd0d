//! Configuration loading and parsing
//!
//! The tester configuration is compiled in from `tester.toml` and parsed
//! at boot by a small no_std parser. build.rs has already rejected a bad
//! file, so falling back to defaults only happens if the two disagree.

pub mod toml;

use defmt::*;
use keycycle_core::config::TesterConfig;

pub use toml::{parse_config, ParseError};

/// Embedded configuration (edit tester.toml and rebuild to customize)
pub const EMBEDDED_CONFIG: &str = include_str!("../../tester.toml");

/// Parse the embedded configuration, or use built-in defaults
pub fn load_config() -> TesterConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!(
                "Configuration loaded: {} stations, {} cycles/min",
                config.station_count, config.timing.cycles_per_minute
            );
            config
        }
        Err(e) => {
            error!("Embedded configuration rejected: {:?}", e);
            warn!("Using built-in defaults");
            TesterConfig::default()
        }
    }
}
