//! In-memory cluster reader.
//!
//! Holds objects, namespaces and release storage entries in maps. Used as the
//! test double for the drift pipeline and for offline runs against captured
//! cluster state.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::StorageDriver;
use crate::error::{DriftError, Result};

use super::reader::{ClusterReader, ObjectRef, StoredEntry};

/// Built-in kinds served without a namespace.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PriorityClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
];

/// Cluster state held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCluster {
    /// Objects by identity.
    objects: HashMap<ObjectRef, Value>,
    /// Known namespaces.
    namespaces: BTreeSet<String>,
    /// Release storage entries by driver and namespace.
    entries: HashMap<(StorageDriver, String), BTreeMap<String, StoredEntry>>,
    /// Objects whose reads fail with an access error.
    forbidden: HashSet<ObjectRef>,
    /// Namespaces whose listings fail with an access error.
    forbidden_namespaces: HashSet<String>,
    /// Cluster scoped kinds beyond the built-in ones.
    cluster_scoped_kinds: HashSet<String>,
}

impl InMemoryCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Kubernetes document, keyed by its own identity.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the document has no identity.
    pub fn insert_document(&mut self, doc: Value) -> Result<ObjectRef> {
        let object = ObjectRef::from_document(&doc)?;
        if let Some(ns) = &object.namespace {
            self.namespaces.insert(ns.clone());
        }
        self.objects.insert(object.clone(), doc);
        Ok(object)
    }

    /// Builder form of [`InMemoryCluster::insert_document`].
    ///
    /// # Errors
    ///
    /// Returns a decode error if the document has no identity.
    pub fn with_document(mut self, doc: Value) -> Result<Self> {
        self.insert_document(doc)?;
        Ok(self)
    }

    /// Adds a namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.insert(namespace.into());
        self
    }

    /// Adds a release storage entry.
    pub fn insert_entry(&mut self, driver: StorageDriver, namespace: &str, entry: StoredEntry) {
        self.namespaces.insert(namespace.to_string());
        self.entries
            .entry((driver, namespace.to_string()))
            .or_default()
            .insert(entry.name.clone(), entry);
    }

    /// Makes reads of `object` fail with an access error.
    #[must_use]
    pub fn forbid(mut self, object: ObjectRef) -> Self {
        self.forbidden.insert(object);
        self
    }

    /// Makes listings in `namespace` fail with an access error.
    #[must_use]
    pub fn forbid_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.forbidden_namespaces.insert(namespace.into());
        self
    }

    /// Serves `kind` without a namespace.
    #[must_use]
    pub fn with_cluster_scoped_kind(mut self, kind: impl Into<String>) -> Self {
        self.cluster_scoped_kinds.insert(kind.into());
        self
    }

    /// Removes an object, returning it if present.
    pub fn remove(&mut self, object: &ObjectRef) -> Option<Value> {
        self.objects.remove(object)
    }
}

#[async_trait]
impl ClusterReader for InMemoryCluster {
    async fn get(&self, object: &ObjectRef) -> Result<Option<Value>> {
        if self.forbidden.contains(object) {
            return Err(DriftError::access(
                format!("get {object}"),
                "forbidden",
            ));
        }

        if let Some(found) = self.objects.get(object) {
            return Ok(Some(found.clone()));
        }

        // Cluster scoped objects are stored without a namespace but may be
        // requested with the release namespace filled in.
        let cluster_scoped = ObjectRef {
            namespace: None,
            ..object.clone()
        };
        Ok(self.objects.get(&cluster_scoped).cloned())
    }

    async fn is_namespaced(&self, object: &ObjectRef) -> Result<bool> {
        let kind = object.kind.as_str();
        Ok(!CLUSTER_SCOPED_KINDS.contains(&kind) && !self.cluster_scoped_kinds.contains(kind))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.iter().cloned().collect())
    }

    async fn list_release_entries(
        &self,
        driver: StorageDriver,
        namespace: &str,
        prefix: &str,
    ) -> Result<Vec<StoredEntry>> {
        if self.forbidden_namespaces.contains(namespace) {
            return Err(DriftError::access(
                format!("list release {driver}s in namespace {namespace}"),
                "forbidden",
            ));
        }

        Ok(self
            .entries
            .get(&(driver, namespace.to_string()))
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| entry.name.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_by_identity() {
        let cluster = InMemoryCluster::new()
            .with_document(json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": { "name": "web", "namespace": "prod" }
            }))
            .unwrap();

        let found = cluster
            .get(&ObjectRef::new("v1", "Service", Some("prod"), "web"))
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = cluster
            .get(&ObjectRef::new("v1", "Service", Some("dev"), "web"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_cluster_scoped_lookup_ignores_namespace() {
        let cluster = InMemoryCluster::new()
            .with_document(json!({
                "apiVersion": "rbac.authorization.k8s.io/v1",
                "kind": "ClusterRole",
                "metadata": { "name": "reader" }
            }))
            .unwrap();

        let found = cluster
            .get(&ObjectRef::new(
                "rbac.authorization.k8s.io/v1",
                "ClusterRole",
                Some("prod"),
                "reader",
            ))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_scope_of_kinds() {
        let cluster = InMemoryCluster::new().with_cluster_scoped_kind("ClusterIssuer");
        let scope = |kind: &str| ObjectRef::new("v1", kind, None, "x");

        assert!(cluster.is_namespaced(&scope("Deployment")).await.unwrap());
        assert!(!cluster.is_namespaced(&scope("ClusterRole")).await.unwrap());
        assert!(!cluster.is_namespaced(&scope("ClusterIssuer")).await.unwrap());
    }

    #[tokio::test]
    async fn test_forbidden_object() {
        let object = ObjectRef::new("v1", "Secret", Some("prod"), "token");
        let cluster = InMemoryCluster::new().forbid(object.clone());

        let err = cluster.get(&object).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Access);
    }

    #[tokio::test]
    async fn test_entries_filtered_by_prefix() {
        let mut cluster = InMemoryCluster::new();
        for name in ["sh.helm.release.v1.web.v1", "sh.helm.release.v1.api.v1"] {
            cluster.insert_entry(
                StorageDriver::Secret,
                "prod",
                StoredEntry {
                    name: name.to_string(),
                    payload: Vec::new(),
                },
            );
        }

        let entries = cluster
            .list_release_entries(StorageDriver::Secret, "prod", "sh.helm.release.v1.web.v")
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);

        let other_driver = cluster
            .list_release_entries(StorageDriver::ConfigMap, "prod", "sh.helm.release.v1.web.v")
            .await
            .unwrap();
        assert!(other_driver.is_empty());
    }
}
