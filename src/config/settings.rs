//! Settings types for a drift detection run.
//!
//! These map to the optional settings YAML file and are passed explicitly
//! into the components that need them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;

/// Default API version of the Flux `HelmRelease` resource.
pub const DEFAULT_DECLARED_API_VERSION: &str = "helm.toolkit.fluxcd.io/v2";

/// Default number of live objects fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings for one drift detection run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriftSettings {
    /// Helm storage driver holding release records.
    pub storage_driver: StorageDriver,
    /// Scan all namespaces for the release record when no storage
    /// namespace is declared.
    pub discover_storage: bool,
    /// Maximum number of concurrent live object fetches.
    pub concurrency: usize,
    /// API version of the declared `HelmRelease` resource.
    pub declared_api_version: String,
}

/// Helm storage drivers that can be read from the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Release records stored as Secrets.
    #[default]
    Secret,
    /// Release records stored as `ConfigMaps`.
    ConfigMap,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            storage_driver: StorageDriver::default(),
            discover_storage: false,
            concurrency: DEFAULT_CONCURRENCY,
            declared_api_version: DEFAULT_DECLARED_API_VERSION.to_string(),
        }
    }
}

impl DriftSettings {
    /// Checks that all settings hold usable values.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::validation(
                "must be at least 1",
                "concurrency",
            ));
        }
        if !self.declared_api_version.contains('/') {
            return Err(ConfigError::validation(
                format!("expected <group>/<version>, got '{}'", self.declared_api_version),
                "declared_api_version",
            ));
        }
        Ok(())
    }
}

impl FromStr for StorageDriver {
    type Err = ConfigError;

    /// Parses a driver name using the values Helm accepts in `HELM_DRIVER`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "secret" | "secrets" => Ok(Self::Secret),
            "configmap" | "configmaps" => Ok(Self::ConfigMap),
            other => Err(ConfigError::UnsupportedDriver {
                driver: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Secret => "secret",
            Self::ConfigMap => "configmap",
        };
        write!(f, "{s}")
    }
}
