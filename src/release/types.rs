//! Release record types.
//!
//! A release record is the state Helm persisted at the last deploy: release
//! metadata plus the rendered manifest split into objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::cluster::ObjectRef;

/// Storage object name prefix for Helm v3 releases.
pub const STORAGE_PREFIX: &str = "sh.helm.release.v1";

/// The recorded deployed state of a release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRecord {
    /// Release name.
    pub name: String,
    /// Namespace the record is stored in.
    pub storage_namespace: String,
    /// Namespace the release objects were installed into.
    pub namespace: String,
    /// Release revision.
    pub version: u64,
    /// Release status at the time of recording.
    pub status: Option<String>,
    /// Chart name and version, if recorded.
    pub chart: Option<String>,
    /// When the release was last deployed.
    pub last_deployed: Option<DateTime<Utc>>,
    /// Rendered manifest, in document order.
    pub manifest: Vec<ManifestObject>,
}

/// One object of a rendered manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    /// Object identity as declared (namespace may be unset).
    pub object: ObjectRef,
    /// Full declared document.
    pub document: Value,
}

/// Helm's JSON release encoding, reduced to the fields drift needs.
#[derive(Debug, Deserialize)]
pub(crate) struct ReleasePayload {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub version: u64,
    #[serde(default)]
    pub manifest: String,
    #[serde(default)]
    pub info: Option<ReleaseInfo>,
    #[serde(default)]
    pub chart: Option<ChartPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_deployed: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartPayload {
    #[serde(default)]
    pub metadata: Option<ChartMetadata>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartMetadata {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Helm writes zero timestamps as empty strings.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.is_empty())
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

impl ReleaseRecord {
    /// Returns the storage object name prefix shared by all revisions of
    /// `release_name`.
    #[must_use]
    pub fn storage_prefix(release_name: &str) -> String {
        format!("{STORAGE_PREFIX}.{release_name}.v")
    }
}

impl std::fmt::Display for ReleaseRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} v{}", self.storage_namespace, self.name, self.version)?;
        if let Some(status) = &self.status {
            write!(f, " ({status})")?;
        }
        Ok(())
    }
}
