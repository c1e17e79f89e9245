//! Kubernetes API backed cluster reader.
//!
//! Objects of arbitrary kinds are resolved through API discovery and fetched
//! as dynamic objects. List calls are paginated with continue tokens.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::{ApiResource, DynamicObject, ListParams};
use kube::core::GroupVersionKind;
use kube::discovery::{self, Scope};
use kube::{Api, Client};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, trace};

use crate::config::StorageDriver;
use crate::error::{DriftError, Result};

use super::reader::{ClusterReader, ObjectRef, StoredEntry};

/// Page size for list requests.
const PAGE_SIZE: u32 = 100;

/// Label Helm sets on every release storage object.
const HELM_OWNER_SELECTOR: &str = "owner=helm";

/// Data key holding the encoded release.
const RELEASE_DATA_KEY: &str = "release";

/// Cluster reader talking to the Kubernetes API server.
pub struct KubeClusterReader {
    /// Kubernetes client.
    client: Client,
    /// Discovered resources by `apiVersion/kind`, with their namespaced flag.
    resources: Mutex<HashMap<String, (ApiResource, bool)>>,
}

impl KubeClusterReader {
    /// Creates a reader from an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a reader from the ambient kubeconfig or in-cluster config.
    ///
    /// # Errors
    ///
    /// Returns an access error if no usable configuration is found.
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| DriftError::access("create Kubernetes client", e.to_string()))?;
        Ok(Self::new(client))
    }

    fn cached(&self, key: &str) -> Option<(ApiResource, bool)> {
        self.resources
            .lock()
            .ok()
            .and_then(|cache| cache.get(key).cloned())
    }

    /// Resolves the API resource for an object's kind.
    ///
    /// Returns `None` when the server does not serve the kind.
    async fn resolve(&self, object: &ObjectRef) -> Result<Option<(ApiResource, bool)>> {
        let key = format!("{}/{}", object.api_version, object.kind);
        if let Some(hit) = self.cached(&key) {
            return Ok(Some(hit));
        }

        let gvk = GroupVersionKind::gvk(object.group(), object.version(), &object.kind);
        let resolved = match discovery::pinned_kind(&self.client, &gvk).await {
            Ok((resource, caps)) => (resource, matches!(caps.scope, Scope::Namespaced)),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                debug!("API group for {key} is not served");
                return Ok(None);
            }
            Err(kube::Error::Discovery(e)) => {
                debug!("Kind {key} is not served: {e}");
                return Ok(None);
            }
            Err(e) => {
                return Err(DriftError::access(
                    format!("discover API resource for {key}"),
                    e.to_string(),
                ));
            }
        };

        if let Ok(mut cache) = self.resources.lock() {
            cache.insert(key, resolved.clone());
        }
        Ok(Some(resolved))
    }

    fn release_list_params(token: Option<String>) -> ListParams {
        let params = ListParams::default()
            .labels(HELM_OWNER_SELECTOR)
            .limit(PAGE_SIZE);
        match token {
            Some(token) => params.continue_token(&token),
            None => params,
        }
    }
}

impl std::fmt::Debug for KubeClusterReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterReader").finish_non_exhaustive()
    }
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn get(&self, object: &ObjectRef) -> Result<Option<Value>> {
        let Some((resource, namespaced)) = self.resolve(object).await? else {
            return Ok(None);
        };

        let api: Api<DynamicObject> = match (namespaced, object.namespace.as_deref()) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &resource),
            (true, None) => Api::default_namespaced_with(self.client.clone(), &resource),
            (false, _) => Api::all_with(self.client.clone(), &resource),
        };

        trace!("Fetching {object}");
        let found = api
            .get_opt(&object.name)
            .await
            .map_err(|e| {
                DriftError::from_kube(e, format!("get {object}"), || {
                    DriftError::not_found(&object.kind, &object.name, object.namespace.as_deref())
                })
            })?;

        found
            .map(|live| {
                serde_json::to_value(live)
                    .map_err(|e| DriftError::decode(format!("live {object}"), e.to_string()))
            })
            .transpose()
    }

    async fn is_namespaced(&self, object: &ObjectRef) -> Result<bool> {
        Ok(self
            .resolve(object)
            .await?
            .is_none_or(|(_, namespaced)| namespaced))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let api = &api;

        collect_pages(move |token| async move {
            let mut params = ListParams::default().limit(PAGE_SIZE);
            if let Some(token) = token {
                params = params.continue_token(&token);
            }
            let page = api
                .list_metadata(&params)
                .await
                .map_err(|e| DriftError::access("list namespaces", e.to_string()))?;
            let names = page
                .items
                .into_iter()
                .filter_map(|ns| ns.metadata.name)
                .collect();
            Ok((names, page.metadata.continue_))
        })
        .await
    }

    async fn list_release_entries(
        &self,
        driver: StorageDriver,
        namespace: &str,
        prefix: &str,
    ) -> Result<Vec<StoredEntry>> {
        let operation = format!("list release {driver}s in namespace {namespace}");
        let operation = operation.as_str();

        match driver {
            StorageDriver::Secret => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
                let api = &api;
                collect_pages(move |token| async move {
                    let page = api
                        .list(&Self::release_list_params(token))
                        .await
                        .map_err(|e| DriftError::access(operation, e.to_string()))?;
                    let entries = page
                        .items
                        .into_iter()
                        .filter_map(|secret| {
                            let name = secret.metadata.name?;
                            name.starts_with(prefix).then(|| StoredEntry {
                                payload: secret
                                    .data
                                    .and_then(|mut data| data.remove(RELEASE_DATA_KEY))
                                    .map(|bytes| bytes.0)
                                    .unwrap_or_default(),
                                name,
                            })
                        })
                        .collect();
                    Ok((entries, page.metadata.continue_))
                })
                .await
            }
            StorageDriver::ConfigMap => {
                let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
                let api = &api;
                collect_pages(move |token| async move {
                    let page = api
                        .list(&Self::release_list_params(token))
                        .await
                        .map_err(|e| DriftError::access(operation, e.to_string()))?;
                    let entries = page
                        .items
                        .into_iter()
                        .filter_map(|config_map| {
                            let name = config_map.metadata.name?;
                            name.starts_with(prefix).then(|| StoredEntry {
                                payload: config_map
                                    .data
                                    .and_then(|mut data| data.remove(RELEASE_DATA_KEY))
                                    .map(String::into_bytes)
                                    .unwrap_or_default(),
                                name,
                            })
                        })
                        .collect();
                    Ok((entries, page.metadata.continue_))
                })
                .await
            }
        }
    }
}

/// Drains a paginated listing, following continue tokens until the server
/// returns none.
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>)>>,
{
    let mut items = Vec::new();
    let mut token = None;

    loop {
        let (page, next) = fetch(token.take()).await?;
        items.extend(page);

        match next.filter(|t| !t.is_empty()) {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(items)
}
