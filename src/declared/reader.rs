//! Declared-state reader.

use tracing::{debug, info};

use crate::cluster::{ClusterReader, ObjectRef};
use crate::error::{DriftError, Result};

use super::types::DeclaredResource;

/// Kind of the declared resource.
pub const DECLARED_KIND: &str = "HelmRelease";

/// Fetches and decodes `HelmRelease` resources.
#[derive(Debug)]
pub struct DeclaredStateReader<'a, C: ClusterReader> {
    /// Cluster reader.
    cluster: &'a C,
    /// API version of the `HelmRelease` resource.
    api_version: &'a str,
}

impl<'a, C: ClusterReader> DeclaredStateReader<'a, C> {
    /// Creates a new reader.
    #[must_use]
    pub const fn new(cluster: &'a C, api_version: &'a str) -> Self {
        Self {
            cluster,
            api_version,
        }
    }

    /// Reads the `HelmRelease` `name` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the resource does not exist, an access
    /// error if it cannot be read, and a decode error if it is malformed.
    pub async fn read_declared(&self, name: &str, namespace: &str) -> Result<DeclaredResource> {
        let object = ObjectRef::new(self.api_version, DECLARED_KIND, Some(namespace), name);
        debug!("Reading {object}");

        let raw = self
            .cluster
            .get(&object)
            .await?
            .ok_or_else(|| DriftError::not_found(DECLARED_KIND, name, Some(namespace)))?;

        let declared: DeclaredResource = serde_json::from_value(raw)
            .map_err(|e| DriftError::decode(format!("{DECLARED_KIND} {namespace}/{name}"), e.to_string()))?;

        info!(
            "Read {DECLARED_KIND} {namespace}/{name} (drift detection: {}, {} ignore rules)",
            declared.drift_mode(),
            declared.ignore_rules().len()
        );
        Ok(declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::config::DEFAULT_DECLARED_API_VERSION;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_declared() {
        let cluster = InMemoryCluster::new()
            .with_document(json!({
                "apiVersion": DEFAULT_DECLARED_API_VERSION,
                "kind": "HelmRelease",
                "metadata": { "name": "web", "namespace": "flux-system" },
                "spec": { "storageNamespace": "web" }
            }))
            .unwrap();

        let reader = DeclaredStateReader::new(&cluster, DEFAULT_DECLARED_API_VERSION);
        let declared = reader.read_declared("web", "flux-system").await.unwrap();
        assert_eq!(declared.storage_namespace(), Some("web"));
    }

    #[tokio::test]
    async fn test_missing_declared_resource() {
        let cluster = InMemoryCluster::new();
        let reader = DeclaredStateReader::new(&cluster, DEFAULT_DECLARED_API_VERSION);

        let err = reader.read_declared("web", "default").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "HelmRelease default/web not found");
    }

    #[tokio::test]
    async fn test_malformed_declared_resource() {
        let cluster = InMemoryCluster::new()
            .with_document(json!({
                "apiVersion": DEFAULT_DECLARED_API_VERSION,
                "kind": "HelmRelease",
                "metadata": { "name": "web", "namespace": "default" },
                "spec": { "driftDetection": { "mode": "sometimes" } }
            }))
            .unwrap();

        let reader = DeclaredStateReader::new(&cluster, DEFAULT_DECLARED_API_VERSION);
        let err = reader.read_declared("web", "default").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
