//! Diff engine for comparing recorded vs live state.
//!
//! This module computes the drift between the manifest a Helm release
//! recorded and the objects currently in the cluster.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cluster::{ClusterReader, ObjectRef};
use crate::config::DEFAULT_CONCURRENCY;
use crate::declared::IgnoreRule;
use crate::error::{Result, ResultExt};
use crate::release::{ManifestObject, ReleaseRecord};

use super::compare::compare;
use super::ignore::IgnoreMatcher;

/// Annotation excluding an object from drift detection.
pub const DRIFT_DETECTION_ANNOTATION: &str = "helm.toolkit.fluxcd.io/driftDetection";

/// Annotation value excluding an object from drift detection.
pub const DRIFT_DETECTION_DISABLED: &str = "disabled";

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// Object is declared but missing from the cluster.
    Create,
    /// Object exists but differs from its declaration.
    Update,
}

/// Operation restoring one field to its declared value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Replace the live value.
    Replace,
    /// Add the missing declared value.
    Add,
    /// Remove the undeclared live value.
    Remove,
}

/// One field-level difference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    /// JSON pointer into the object document.
    pub path: String,
    /// Recovery operation.
    pub op: OperationKind,
    /// Live value overwritten or removed by the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<Value>,
}

/// Difference for a single object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    /// Object identity, scoped as stored in the cluster.
    pub object: ObjectRef,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Field operations, in document order. Empty for `Create`.
    pub patch: Vec<PatchOperation>,
}

/// Drift of a release, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiffSet {
    entries: Vec<DiffEntry>,
}

/// Engine for computing diffs between recorded and live state.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    /// Maximum number of concurrent live fetches.
    concurrency: usize,
}

impl OperationKind {
    /// Lowercase operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DiffSet {
    /// Creates a diff set from entries in manifest order.
    #[must_use]
    pub const fn new(entries: Vec<DiffEntry>) -> Self {
        Self { entries }
    }

    /// Whether any object was classified as created or updated.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Entries in manifest order.
    #[must_use]
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    /// Number of drifted objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no object drifted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<DiffEntry>> for DiffSet {
    fn from(entries: Vec<DiffEntry>) -> Self {
        Self::new(entries)
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl DiffEngine {
    /// Creates a new diff engine fetching up to `concurrency` objects at
    /// once.
    #[must_use]
    pub const fn new(concurrency: usize) -> Self {
        Self {
            concurrency: if concurrency == 0 { 1 } else { concurrency },
        }
    }

    /// Computes the drift of `record` against the live cluster.
    ///
    /// # Errors
    ///
    /// Returns a decode error if an ignore rule is invalid, and an access
    /// error if a live object cannot be read.
    pub async fn diff<C: ClusterReader>(
        &self,
        record: &ReleaseRecord,
        cluster: &C,
        ignore_rules: &[IgnoreRule],
    ) -> Result<DiffSet> {
        let matcher = IgnoreMatcher::new(ignore_rules).context("compile ignore rules")?;

        let fetches: Vec<_> = record
            .manifest
            .iter()
            .map(|manifest| Self::fetch(cluster, manifest, &record.namespace))
            .collect();
        let fetched: Vec<(ObjectRef, &ManifestObject, Option<Value>)> = stream::iter(fetches)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let entries: Vec<DiffEntry> = fetched
            .into_iter()
            .filter_map(|(object, manifest, live)| {
                Self::diff_object(object, &manifest.document, live.as_ref(), &matcher)
            })
            .collect();

        info!(
            "Compared {} objects of {}, {} drifted",
            record.manifest.len(),
            record.name,
            entries.len()
        );
        Ok(DiffSet::new(entries))
    }

    /// Scopes a manifest object and fetches its live counterpart.
    async fn fetch<'m, C: ClusterReader>(
        cluster: &C,
        manifest: &'m ManifestObject,
        namespace: &str,
    ) -> Result<(ObjectRef, &'m ManifestObject, Option<Value>)> {
        let namespaced = cluster
            .is_namespaced(&manifest.object)
            .await
            .with_context(|| format!("resolve scope of {}", manifest.object))?;
        let object = manifest.object.clone().scoped(namespaced, namespace);

        let live = cluster
            .get(&object)
            .await
            .with_context(|| format!("fetch live {object}"))?;
        Ok((object, manifest, live))
    }

    fn diff_object(
        object: ObjectRef,
        declared: &Value,
        live: Option<&Value>,
        matcher: &IgnoreMatcher,
    ) -> Option<DiffEntry> {
        if detection_disabled(declared) || live.is_some_and(detection_disabled) {
            debug!("Skipping {object}: drift detection disabled by annotation");
            return None;
        }
        if matcher.ignores_object(&object, declared) {
            debug!("Skipping {object}: ignored");
            return None;
        }

        let Some(live) = live else {
            debug!("{object} is missing");
            return Some(DiffEntry {
                object,
                diff_type: DiffType::Create,
                patch: Vec::new(),
            });
        };

        let patch = matcher.retain(&object, declared, compare(declared, live));
        if patch.is_empty() {
            return None;
        }
        debug!("{object} has {} drifted fields", patch.len());
        Some(DiffEntry {
            object,
            diff_type: DiffType::Update,
            patch,
        })
    }
}

fn detection_disabled(document: &Value) -> bool {
    document
        .pointer("/metadata/annotations")
        .and_then(|a| a.get(DRIFT_DETECTION_ANNOTATION))
        .and_then(Value::as_str)
        == Some(DRIFT_DETECTION_DISABLED)
}
