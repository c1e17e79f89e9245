//! CLI argument definitions.
//!
//! This module defines the command-line arguments using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{DriftSettings, StorageDriver, ENV_CONFIG};

/// helm-drift - Detects drift between a Helm release and the live cluster.
#[derive(Parser, Debug)]
#[command(name = "helm-drift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Namespace of the `HelmRelease`.
    #[arg(short, long, default_value = "default")]
    pub namespace: String,

    /// Name of the `HelmRelease`.
    #[arg(short, long)]
    pub release: String,

    /// Path to a settings file.
    #[arg(short, long, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Helm storage driver (secret, configmap); overrides `HELM_DRIVER`.
    #[arg(long, value_parser = parse_driver)]
    pub driver: Option<StorageDriver>,

    /// Search all namespaces for the release record when the `HelmRelease`
    /// declares no storage namespace.
    #[arg(long)]
    pub discover_storage: bool,

    /// Maximum number of concurrent live object reads.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output format (text, json).
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    /// Exit with status 2 when drift is detected.
    #[arg(long)]
    pub exit_code: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report.
    #[default]
    Text,
    /// JSON output.
    Json,
}

impl Cli {
    /// Applies flags that override settings.
    pub fn apply_overrides(&self, settings: &mut DriftSettings) {
        if let Some(driver) = self.driver {
            settings.storage_driver = driver;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if self.discover_storage {
            settings.discover_storage = true;
        }
    }
}

fn parse_driver(value: &str) -> Result<StorageDriver, String> {
    value.parse::<StorageDriver>().map_err(|e| e.to_string())
}
