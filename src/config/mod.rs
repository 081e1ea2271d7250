//! Configuration module for assetpipe
//!
//! Provides types and parsing for `assetpipe.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides,
    validate_config, CliOverrides, ConfigError, CONFIG_FILE,
};
pub use schema::*;
