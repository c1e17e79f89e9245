//! JSON pointer paths.
//!
//! Paths use the RFC 6901 syntax: `/` separated segments with `~0` and
//! `~1` escaping `~` and `/`.

use crate::error::{DriftError, Result};

/// Escapes one path segment.
#[must_use]
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Joins segments into a pointer. No segments yields the root pointer `""`.
#[must_use]
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments.iter().fold(String::new(), |mut path, segment| {
        path.push('/');
        path.push_str(&escape_segment(segment.as_ref()));
        path
    })
}

/// Splits a pointer into unescaped segments.
///
/// # Errors
///
/// Returns a decode error if a non-empty pointer does not start with `/`.
pub fn split(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(DriftError::decode(
            "ignore path",
            format!("'{pointer}' is not a JSON pointer"),
        ));
    };
    Ok(rest
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Whether `ancestor` equals `path` or is a segment-wise ancestor of it.
#[must_use]
pub fn is_ancestor_or_self<S: AsRef<str>>(ancestor: &[String], path: &[S]) -> bool {
    ancestor.len() <= path.len()
        && ancestor
            .iter()
            .zip(path)
            .all(|(a, p)| a.as_str() == p.as_ref())
}
