//! helm-drift CLI entrypoint.
//!
//! This is the main entrypoint for the helm-drift command-line tool.

use std::path::Path;
use std::process::ExitCode;

use helm_drift_detect::backend::ClusterBackend;
use helm_drift_detect::cli::{Cli, OutputFormatter};
use helm_drift_detect::cluster::KubeClusterReader;
use helm_drift_detect::config::{DriftSettings, SettingsParser};
use helm_drift_detect::detector::{DriftDetector, DriftOutcome};
use helm_drift_detect::error::Result;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit status when drift is detected and `--exit-code` is set.
const EXIT_DRIFT: u8 = 2;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(outcome) if cli.exit_code && outcome.has_drift() => ExitCode::from(EXIT_DRIFT),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so stdout only carries the report.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: &Cli) -> Result<DriftOutcome> {
    let settings = load_settings(cli)?;
    let formatter = OutputFormatter::new(cli.output);

    let cluster = KubeClusterReader::try_default().await?;
    let backend = ClusterBackend::new(cluster, settings.clone());

    let mut detector = DriftDetector::new(&backend, &settings, formatter.report_sink());
    let outcome = detector.run(&cli.release, &cli.namespace).await?;

    formatter.write_outcome(&outcome, &mut std::io::stdout())?;
    Ok(outcome)
}

/// Loads settings from file and environment, then applies flags.
fn load_settings(cli: &Cli) -> Result<DriftSettings> {
    let base = cli
        .config
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let parser = SettingsParser::new().with_base_path(base);
    parser.load_dotenv()?;

    let mut settings = parser.load(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;

    debug!("Using settings: {settings:?}");
    Ok(settings)
}
