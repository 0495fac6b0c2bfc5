//! # ny511 Config
//!
//! Validated configuration for ny511-dash: YAML or TOML files, `NY511_*`
//! environment overrides and conversions into the runtime settings of the SODA
//! client and the logging subscriber.
//!
//! Configuration is loaded once at startup and treated as immutable afterwards.

pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validation;

pub use defaults::{DATASET_MIN_DATE, DEFAULT_RANGE_END, DEFAULT_RANGE_START};
pub use loader::{ConfigError, ConfigFormat, ConfigLoader, CONFIG_PATH_VAR};
pub use schema::*;
