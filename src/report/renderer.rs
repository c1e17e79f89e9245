//! Text rendering of drift.
//!
//! The layout is a fixed textual contract: numbered resources, each with a
//! reason and, for changed resources, numbered recovery operations.

use std::fmt::Write;

use serde_json::{Number, Value};

use crate::drift::{DiffEntry, DiffSet, DiffType, PatchOperation};

const INDENT: &str = "    ";

/// Reason shown for objects missing from the cluster.
pub const REASON_REMOVED: &str = "removed";

/// Reason shown for objects that differ from their declaration.
pub const REASON_CHANGED: &str = "changed";

/// A rendered drift report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    lines: Vec<String>,
}

/// Renders diff sets as reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportRenderer;

impl Report {
    /// Report lines, without line terminators.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

impl ReportRenderer {
    /// Creates a new renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders the drift of `release` in `namespace`.
    #[must_use]
    pub fn render(&self, diff: &DiffSet, release: &str, namespace: &str) -> Report {
        if !diff.has_changes() {
            return Report {
                lines: vec![format!("No drift detected in {namespace}/{release}")],
            };
        }

        let mut lines = vec![format!("Detected drift in HelmRelease {namespace}/{release}:")];
        for (index, entry) in diff.entries().iter().enumerate() {
            lines.push(String::new());
            Self::render_entry(&mut lines, index + 1, entry);
        }
        Report { lines }
    }

    fn render_entry(lines: &mut Vec<String>, index: usize, entry: &DiffEntry) {
        lines.push(format!(
            "{index} - Resource: {}/{}",
            entry.object.kind, entry.object.name
        ));
        match entry.diff_type {
            DiffType::Create => lines.push(format!("{INDENT}Reason: {REASON_REMOVED}")),
            DiffType::Update => {
                lines.push(format!("{INDENT}Reason: {REASON_CHANGED}"));
                for (op_index, operation) in entry.patch.iter().enumerate() {
                    Self::render_operation(lines, op_index + 1, operation);
                }
            }
        }
    }

    fn render_operation(lines: &mut Vec<String>, index: usize, operation: &PatchOperation) {
        lines.push(format!("{INDENT}{index} - Path: {}", operation.path));
        lines.push(format!(
            "{INDENT}{INDENT}Recovery Operation: {}",
            operation.op
        ));
        if let Some(original) = &operation.original {
            lines.push(format!(
                "{INDENT}{INDENT}Original Value: {}",
                format_value(original)
            ));
        }
    }
}

/// Formats a value the way Go's `%v` verb prints decoded JSON.
#[must_use]
pub fn format_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("<nil>"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Number(n) => write_number(out, n),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push_str("map[");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push(']');
        }
    }
}

fn write_number(out: &mut String, number: &Number) {
    if number.is_i64() || number.is_u64() {
        let _ = write!(out, "{number}");
        return;
    }
    let Some(f) = number.as_f64() else {
        let _ = write!(out, "{number}");
        return;
    };

    // Shortest representation, switching to an exponent outside [1e-4, 1e6).
    let scientific = format!("{f:e}");
    let exponent = scientific
        .split_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or_default();
    if (-4..6).contains(&exponent) {
        let _ = write!(out, "{f}");
    } else if let Some((mantissa, _)) = scientific.split_once('e') {
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "{mantissa}e{sign}{:02}", exponent.abs());
    }
}
