//! Report sinks.
//!
//! A sink receives a rendered report one line at a time.

use std::io::Write;

use tracing::info;

use crate::error::Result;

use super::renderer::Report;

/// Destination of rendered reports.
pub trait ReportSink: Send {
    /// Receives one report line.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the line cannot be written.
    fn emit_line(&mut self, line: &str) -> Result<()>;

    /// Receives a whole report, line by line.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`ReportSink::emit_line`].
    fn emit(&mut self, report: &Report) -> Result<()> {
        for line in report.lines() {
            self.emit_line(line)?;
        }
        self.finish()
    }

    /// Called once a report is complete.
    ///
    /// # Errors
    ///
    /// Returns an IO error if buffered output cannot be flushed.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes report lines to a writer, such as stdout.
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    /// Creates a sink writing to `writer`.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for WriterSink<W> {
    fn emit_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Emits report lines as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn emit_line(&mut self, line: &str) -> Result<()> {
        info!("{line}");
        Ok(())
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn emit_line(&mut self, line: &str) -> Result<()> {
        (**self).emit_line(line)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Collects report lines in memory.
impl ReportSink for Vec<String> {
    fn emit_line(&mut self, line: &str) -> Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}
