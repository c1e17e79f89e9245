//! Drift reports.
//!
//! This module renders a diff set as the user-facing text report and
//! delivers it to a sink.

mod renderer;
mod sink;

pub use renderer::{format_value, Report, ReportRenderer, REASON_CHANGED, REASON_REMOVED};
pub use sink::{ReportSink, TracingSink, WriterSink};
