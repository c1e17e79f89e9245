//! Declared resource types.
//!
//! These map to the parts of the Flux `HelmRelease` resource that affect
//! drift detection.

use serde::{Deserialize, Serialize};

/// The intent object governing a release.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclaredResource {
    /// Object metadata.
    #[serde(default)]
    pub metadata: DeclaredMetadata,
    /// Release specification.
    #[serde(default)]
    pub spec: DeclaredSpec,
}

/// Name and namespace of the declared resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclaredMetadata {
    /// Resource name.
    #[serde(default)]
    pub name: String,
    /// Resource namespace.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Drift-relevant fields of the `HelmRelease` spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredSpec {
    /// Overrides the Helm release name.
    #[serde(default)]
    pub release_name: Option<String>,
    /// Overrides the namespace holding the release record.
    #[serde(default)]
    pub storage_namespace: Option<String>,
    /// Drift detection configuration.
    #[serde(default)]
    pub drift_detection: Option<DriftDetection>,
}

/// Drift detection configuration of a release.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriftDetection {
    /// Whether the controller acts on drift.
    #[serde(default)]
    pub mode: DriftMode,
    /// Fields and objects excluded from comparison.
    #[serde(default)]
    pub ignore: Vec<IgnoreRule>,
}

/// Drift detection modes of the Flux helm-controller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriftMode {
    /// Drift is detected and corrected.
    Enabled,
    /// Drift is detected and reported only.
    Warn,
    /// Drift is not detected by the controller.
    #[default]
    Disabled,
}

/// Excludes fields, or whole objects, from drift reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IgnoreRule {
    /// JSON pointers to exclude; empty excludes the whole object.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Objects the rule applies to; `None` applies to all objects.
    #[serde(default)]
    pub target: Option<Selector>,
}

/// Object selector of an ignore rule.
///
/// `group`, `version`, `kind`, `name` and `namespace` are regular
/// expressions matched against the whole value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// API group.
    #[serde(default)]
    pub group: Option<String>,
    /// API version.
    #[serde(default)]
    pub version: Option<String>,
    /// Object kind.
    #[serde(default)]
    pub kind: Option<String>,
    /// Object name.
    #[serde(default)]
    pub name: Option<String>,
    /// Object namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Requirements on annotations.
    #[serde(default)]
    pub annotation_selector: Option<String>,
    /// Requirements on labels.
    #[serde(default)]
    pub label_selector: Option<String>,
}

impl DeclaredResource {
    /// Release name to use, falling back to `default`.
    #[must_use]
    pub fn release_name<'a>(&'a self, default: &'a str) -> &'a str {
        non_empty(self.spec.release_name.as_deref()).unwrap_or(default)
    }

    /// Storage namespace override, if declared.
    #[must_use]
    pub fn storage_namespace(&self) -> Option<&str> {
        non_empty(self.spec.storage_namespace.as_deref())
    }

    /// Ignore rules, in declaration order.
    #[must_use]
    pub fn ignore_rules(&self) -> &[IgnoreRule] {
        self.spec
            .drift_detection
            .as_ref()
            .map_or(&[][..], |d| d.ignore.as_slice())
    }

    /// Declared drift detection mode.
    #[must_use]
    pub fn drift_mode(&self) -> DriftMode {
        self.spec
            .drift_detection
            .as_ref()
            .map_or(DriftMode::Disabled, |d| d.mode)
    }
}

impl IgnoreRule {
    /// Creates a rule for `paths` on objects matching `target`.
    #[must_use]
    pub fn new(target: Option<Selector>, paths: &[&str]) -> Self {
        Self {
            paths: paths.iter().map(|p| (*p).to_string()).collect(),
            target,
        }
    }
}

impl Selector {
    /// Selects objects of `kind` named `name`.
    #[must_use]
    pub fn kind_name(kind: &str, name: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl std::fmt::Display for DriftMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Enabled => "enabled",
            Self::Warn => "warn",
            Self::Disabled => "disabled",
        };
        write!(f, "{s}")
    }
}
