//! Settings loader.
//!
//! Settings come from an optional YAML file, then environment overrides.
//! Command-line flags are applied on top by the caller.

use crate::error::{ConfigError, DriftError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::settings::DriftSettings;

/// Environment variable selecting the Helm storage driver.
pub const ENV_HELM_DRIVER: &str = "HELM_DRIVER";

/// Environment variable overriding the fetch concurrency.
pub const ENV_CONCURRENCY: &str = "HELM_DRIFT_CONCURRENCY";

/// Environment variable pointing at a settings file.
pub const ENV_CONFIG: &str = "HELM_DRIFT_CONFIG";

/// Loader for [`DriftSettings`].
#[derive(Debug, Default)]
pub struct SettingsParser {
    /// Directory searched for `.env`.
    base_path: Option<PathBuf>,
}

impl SettingsParser {
    /// Creates a new settings parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory searched for `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DriftSettings> {
        let path = path.as_ref();
        info!("Loading settings from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            DriftError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DriftSettings> {
        debug!("Parsing YAML settings");

        if content.trim().is_empty() {
            return Ok(DriftSettings::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            DriftError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads settings from `path` if given, else defaults, then applies
    /// environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an override is invalid.
    pub fn load(&self, path: Option<&Path>) -> Result<DriftSettings> {
        let mut settings = match path {
            Some(p) => self.load_file(p)?,
            None => DriftSettings::default(),
        };

        Self::apply_env_overrides(&mut settings, |name| std::env::var(name).ok())?;
        settings.validate()?;

        Ok(settings)
    }

    /// Applies environment variable overrides using `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an invalid value.
    pub fn apply_env_overrides<F>(settings: &mut DriftSettings, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(driver) = lookup(ENV_HELM_DRIVER) {
            debug!("Overriding storage_driver from environment");
            settings.storage_driver = driver.parse()?;
        }

        if let Some(value) = lookup(ENV_CONCURRENCY) {
            debug!("Overriding concurrency from environment");
            settings.concurrency = value.trim().parse().map_err(|_| {
                ConfigError::validation(
                    format!("'{value}' is not a positive integer"),
                    ENV_CONCURRENCY,
                )
            })?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                DriftError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}
