//! Output formatting for the CLI.
//!
//! Text output is the rendered report written line by line to stdout. JSON
//! output is the whole outcome, with the report lines sent to the log
//! instead.

use std::io::Write;

use serde::Serialize;

use crate::detector::DriftOutcome;
use crate::error::Result;
use crate::report::{ReportSink, TracingSink, WriterSink};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeJson<'a> {
    #[serde(flatten)]
    outcome: &'a DriftOutcome,
    has_drift: bool,
    report: &'a [String],
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Sink receiving the rendered report.
    #[must_use]
    pub fn report_sink(&self) -> Box<dyn ReportSink> {
        match self.format {
            OutputFormat::Text => Box::new(WriterSink::new(std::io::stdout())),
            OutputFormat::Json => Box::new(TracingSink),
        }
    }

    /// Formats an outcome, or returns `None` if the report sink already
    /// delivered everything.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the outcome cannot be serialized.
    pub fn format_outcome(&self, outcome: &DriftOutcome) -> Result<Option<String>> {
        match self.format {
            OutputFormat::Text => Ok(None),
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&OutcomeJson {
                    outcome,
                    has_drift: outcome.has_drift(),
                    report: outcome.report.lines(),
                })
                .map_err(std::io::Error::from)?;
                Ok(Some(json))
            }
        }
    }

    /// Writes the formatted outcome, if any, to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if serializing or writing fails.
    pub fn write_outcome(&self, outcome: &DriftOutcome, writer: &mut impl Write) -> Result<()> {
        if let Some(output) = self.format_outcome(outcome)? {
            writeln!(writer, "{output}")?;
            writer.flush()?;
        }
        Ok(())
    }
}
