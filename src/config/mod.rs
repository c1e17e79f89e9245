//! Configuration module for drift detection.
//!
//! This module handles run settings:
//! - Deserializing the optional settings YAML file
//! - Environment variable overrides (`HELM_DRIVER` and friends)
//! - Validation of setting values

mod parser;
mod settings;

pub use parser::{SettingsParser, ENV_CONCURRENCY, ENV_CONFIG, ENV_HELM_DRIVER};
pub use settings::{
    DriftSettings, StorageDriver, DEFAULT_CONCURRENCY, DEFAULT_DECLARED_API_VERSION,
};
