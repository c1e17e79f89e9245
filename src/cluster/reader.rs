//! Cluster reader trait and object identity.
//!
//! This module defines the narrow, read-only interface the drift pipeline
//! uses to query the cluster.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::StorageDriver;
use crate::error::{DriftError, Result};

/// Identity of a Kubernetes object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// `group/version`, or just `version` for the core group.
    pub api_version: String,
    /// Object kind.
    pub kind: String,
    /// Namespace; `None` for cluster scoped objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

/// One stored Helm release entry (a Secret or `ConfigMap`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Name of the storage object.
    pub name: String,
    /// Contents of its `release` data key, still Helm-encoded.
    pub payload: Vec<u8>,
}

/// Read-only access to cluster state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Fetches an object by identity.
    ///
    /// Returns `None` if the object does not exist.
    async fn get(&self, object: &ObjectRef) -> Result<Option<Value>>;

    /// Whether objects of this kind live in a namespace.
    ///
    /// Kinds the cluster does not serve are reported as namespaced.
    async fn is_namespaced(&self, object: &ObjectRef) -> Result<bool>;

    /// Lists the names of all namespaces.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Lists release storage entries in `namespace` whose name starts with
    /// `prefix`.
    async fn list_release_entries(
        &self,
        driver: StorageDriver,
        namespace: &str,
        prefix: &str,
    ) -> Result<Vec<StoredEntry>>;
}

impl ObjectRef {
    /// Creates a new object reference.
    #[must_use]
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(String::from),
            name: name.into(),
        }
    }

    /// Reads the identity of a Kubernetes document.
    ///
    /// # Errors
    ///
    /// Returns a decode error if `apiVersion`, `kind` or `metadata.name`
    /// is missing.
    pub fn from_document(doc: &Value) -> Result<Self> {
        let field = |pointer: &str| doc.pointer(pointer).and_then(Value::as_str);

        let kind = field("/kind").filter(|k| !k.is_empty());
        let api_version = field("/apiVersion").filter(|v| !v.is_empty());
        let name = field("/metadata/name").filter(|n| !n.is_empty());

        match (api_version, kind, name) {
            (Some(api_version), Some(kind), Some(name)) => Ok(Self::new(
                api_version,
                kind,
                field("/metadata/namespace"),
                name,
            )),
            _ => Err(DriftError::decode(
                "manifest object",
                format!(
                    "apiVersion, kind and metadata.name are required (kind: {}, name: {})",
                    kind.unwrap_or("<none>"),
                    name.unwrap_or("<none>")
                ),
            )),
        }
    }

    /// Returns a copy with `namespace` filled in if none is set.
    #[must_use]
    pub fn or_namespace(mut self, namespace: &str) -> Self {
        if self.namespace.is_none() && !namespace.is_empty() {
            self.namespace = Some(namespace.to_string());
        }
        self
    }

    /// Returns a copy scoped the way the cluster stores it: namespaced
    /// objects get `namespace` when none is declared, cluster scoped objects
    /// lose any declared namespace.
    #[must_use]
    pub fn scoped(self, namespaced: bool, namespace: &str) -> Self {
        if namespaced {
            self.or_namespace(namespace)
        } else {
            Self {
                namespace: None,
                ..self
            }
        }
    }

    /// API group; empty for the core group.
    #[must_use]
    pub fn group(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or("", |(group, _)| group)
    }

    /// API version without the group.
    #[must_use]
    pub fn version(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or(self.api_version.as_str(), |(_, version)| version)
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {ns}/{}", self.kind, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}
