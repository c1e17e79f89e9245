//! CLI module for the helm-drift tool.
//!
//! This module provides the command-line interface for checking a Helm
//! release for drift.

mod commands;
mod output;

pub use commands::{Cli, OutputFormat};
pub use output::OutputFormatter;
