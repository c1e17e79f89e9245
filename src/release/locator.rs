//! Release locator.
//!
//! Finds the storage namespace of a release when it is not known and loads
//! the latest recorded revision.

use tracing::{debug, info};

use crate::cluster::{ClusterReader, StoredEntry};
use crate::config::StorageDriver;
use crate::error::{DriftError, Result, ResultExt};

use super::codec::{decode_payload, parse_manifest};
use super::types::ReleaseRecord;

/// Where to look for a release record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageScope {
    /// The record lives in this namespace.
    Namespace(String),
    /// Scan all namespaces for the record.
    Discover,
}

/// Locates and loads Helm release records.
#[derive(Debug)]
pub struct ReleaseLocator<'a, C: ClusterReader> {
    /// Cluster reader.
    cluster: &'a C,
    /// Storage driver holding the records.
    driver: StorageDriver,
}

impl<'a, C: ClusterReader> ReleaseLocator<'a, C> {
    /// Creates a new locator.
    #[must_use]
    pub const fn new(cluster: &'a C, driver: StorageDriver) -> Self {
        Self { cluster, driver }
    }

    /// Loads the latest revision of `release_name`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no record exists in the searched scope,
    /// an access error if storage cannot be listed, and a decode error if
    /// the latest record is malformed.
    pub async fn locate(&self, release_name: &str, scope: &StorageScope) -> Result<ReleaseRecord> {
        let prefix = ReleaseRecord::storage_prefix(release_name);

        let (namespace, entries) = match scope {
            StorageScope::Namespace(ns) => {
                let entries = self.candidates(ns, &prefix).await?;
                if entries.is_empty() {
                    return Err(DriftError::not_found("Helm release", release_name, Some(ns.as_str())));
                }
                (ns.clone(), entries)
            }
            StorageScope::Discover => self.discover(release_name, &prefix).await?,
        };

        let (version, entry) = entries
            .into_iter()
            .max_by_key(|(version, _)| *version)
            .ok_or_else(|| DriftError::not_found("Helm release", release_name, Some(namespace.as_str())))?;

        debug!("Latest revision of {release_name} is {version} ({})", entry.name);
        self.load(&namespace, &entry)
            .with_context(|| format!("read Helm release {namespace}/{release_name}"))
    }

    /// Scans namespaces in lexicographic order and returns the first one
    /// holding a record of the release.
    async fn discover(
        &self,
        release_name: &str,
        prefix: &str,
    ) -> Result<(String, Vec<(u64, StoredEntry)>)> {
        let mut namespaces = self
            .cluster
            .list_namespaces()
            .await
            .with_context(|| format!("discover storage namespace of {release_name}"))?;
        namespaces.sort();
        namespaces.dedup();

        info!(
            "Searching {} namespaces for Helm release {release_name}",
            namespaces.len()
        );

        for namespace in namespaces {
            let entries = self.candidates(&namespace, prefix).await?;
            if !entries.is_empty() {
                info!("Found Helm release {release_name} in namespace {namespace}");
                return Ok((namespace, entries));
            }
        }

        Err(DriftError::not_found("Helm release", release_name, None))
    }

    /// Lists storage entries of the release in `namespace`, with their
    /// revision parsed from the entry name.
    async fn candidates(&self, namespace: &str, prefix: &str) -> Result<Vec<(u64, StoredEntry)>> {
        let entries = self
            .cluster
            .list_release_entries(self.driver, namespace, prefix)
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let version = entry.name.strip_prefix(prefix)?.parse::<u64>().ok()?;
                Some((version, entry))
            })
            .collect())
    }

    fn load(&self, namespace: &str, entry: &StoredEntry) -> Result<ReleaseRecord> {
        let payload = decode_payload(&entry.name, &entry.payload)?;
        let manifest = parse_manifest(&payload.manifest)?;

        let namespace_installed = if payload.namespace.is_empty() {
            namespace.to_string()
        } else {
            payload.namespace
        };

        let record = ReleaseRecord {
            name: payload.name,
            storage_namespace: namespace.to_string(),
            namespace: namespace_installed,
            version: payload.version,
            status: payload.info.as_ref().and_then(|i| i.status.clone()),
            last_deployed: payload.info.and_then(|i| i.last_deployed),
            chart: payload
                .chart
                .and_then(|c| c.metadata)
                .map(|m| format!("{}-{}", m.name, m.version)),
            manifest,
        };

        info!(
            "Loaded Helm release {record} with {} objects from {} storage",
            record.manifest.len(),
            self.driver
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, MockClusterReader};
    use crate::error::ErrorKind;
    use crate::release::encode_release;
    use serde_json::json;

    fn entry(name: &str, version: u64, manifest: &str) -> StoredEntry {
        let release = json!({
            "name": name,
            "namespace": "apps",
            "version": version,
            "manifest": manifest,
            "info": { "status": "deployed" }
        });
        StoredEntry {
            name: format!("sh.helm.release.v1.{name}.v{version}"),
            payload: encode_release(&release).unwrap(),
        }
    }

    const CONFIG_MAP: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: app\n";

    #[tokio::test]
    async fn test_locate_picks_latest_revision() {
        let mut cluster = InMemoryCluster::new();
        for version in [1, 10, 2] {
            cluster.insert_entry(StorageDriver::Secret, "flux", entry("app", version, CONFIG_MAP));
        }

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let record = locator
            .locate("app", &StorageScope::Namespace(String::from("flux")))
            .await
            .unwrap();

        assert_eq!(record.version, 10);
        assert_eq!(record.storage_namespace, "flux");
        assert_eq!(record.namespace, "apps");
        assert_eq!(record.manifest.len(), 1);
        assert_eq!(record.status.as_deref(), Some("deployed"));
    }

    #[tokio::test]
    async fn test_locate_ignores_longer_release_names() {
        let mut cluster = InMemoryCluster::new();
        cluster.insert_entry(StorageDriver::Secret, "flux", entry("app", 1, CONFIG_MAP));
        cluster.insert_entry(
            StorageDriver::Secret,
            "flux",
            StoredEntry {
                name: String::from("sh.helm.release.v1.app.vnext.v7"),
                payload: Vec::new(),
            },
        );

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let record = locator
            .locate("app", &StorageScope::Namespace(String::from("flux")))
            .await
            .unwrap();
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_discover_prefers_first_namespace() {
        let mut cluster = InMemoryCluster::new().with_namespace("aaa");
        cluster.insert_entry(StorageDriver::Secret, "zeta", entry("app", 5, CONFIG_MAP));
        cluster.insert_entry(StorageDriver::Secret, "beta", entry("app", 2, CONFIG_MAP));

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let record = locator.locate("app", &StorageScope::Discover).await.unwrap();

        assert_eq!(record.storage_namespace, "beta");
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn test_discover_not_found_names_release() {
        let cluster = InMemoryCluster::new().with_namespace("default").with_namespace("kube-system");

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let err = locator.locate("x", &StorageScope::Discover).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Helm release x not found");
    }

    #[tokio::test]
    async fn test_known_namespace_not_found() {
        let cluster = InMemoryCluster::new();
        let locator = ReleaseLocator::new(&cluster, StorageDriver::ConfigMap);

        let err = locator
            .locate("app", &StorageScope::Namespace(String::from("flux")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_decode_error() {
        let mut cluster = InMemoryCluster::new();
        cluster.insert_entry(
            StorageDriver::Secret,
            "flux",
            StoredEntry {
                name: String::from("sh.helm.release.v1.app.v1"),
                payload: b"H4sIAAAA-broken".to_vec(),
            },
        );

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let err = locator
            .locate("app", &StorageScope::Namespace(String::from("flux")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_namespace_listing_denied() {
        let mut cluster = MockClusterReader::new();
        cluster
            .expect_list_namespaces()
            .returning(|| Err(DriftError::access("list namespaces", "forbidden")));

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let err = locator.locate("app", &StorageScope::Discover).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
    }

    #[tokio::test]
    async fn test_discover_aborts_on_forbidden_namespace() {
        let mut cluster = InMemoryCluster::new().forbid_namespace("alpha");
        cluster.insert_entry(StorageDriver::Secret, "alpha", entry("app", 1, CONFIG_MAP));
        cluster.insert_entry(StorageDriver::Secret, "beta", entry("app", 1, CONFIG_MAP));

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let err = locator.locate("app", &StorageScope::Discover).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
    }

    #[tokio::test]
    async fn test_discover_stops_at_first_match() {
        let mut cluster = MockClusterReader::new();
        cluster
            .expect_list_namespaces()
            .returning(|| Ok(vec![String::from("b"), String::from("a"), String::from("c")]));
        cluster
            .expect_list_release_entries()
            .withf(|_, namespace, _| namespace.to_string() == "a")
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        cluster
            .expect_list_release_entries()
            .withf(|_, namespace, _| namespace.to_string() == "b")
            .times(1)
            .returning(|_, _, _| Ok(vec![entry("app", 1, CONFIG_MAP)]));

        let locator = ReleaseLocator::new(&cluster, StorageDriver::Secret);
        let record = locator.locate("app", &StorageScope::Discover).await.unwrap();
        assert_eq!(record.storage_namespace, "b");
    }
}
