//! Drift backends.
//!
//! A backend bundles the capabilities the detector depends on: reading the
//! declared resource, loading the last release record, and diffing it
//! against live state.

use async_trait::async_trait;

use crate::cluster::ClusterReader;
use crate::config::DriftSettings;
use crate::declared::{DeclaredResource, DeclaredStateReader, IgnoreRule};
use crate::drift::{DiffEngine, DiffSet};
use crate::error::Result;
use crate::release::{ReleaseLocator, ReleaseRecord, StorageScope};

/// Capabilities required to detect drift of a release.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriftBackend: Send + Sync {
    /// Reads the declared `HelmRelease` `name` in `namespace`.
    async fn declared_resource(&self, name: &str, namespace: &str) -> Result<DeclaredResource>;

    /// Loads the latest record of `release_name` within `scope`.
    async fn last_release(&self, release_name: &str, scope: &StorageScope) -> Result<ReleaseRecord>;

    /// Diffs `record` against live state, excluding `ignore_rules`.
    async fn diff_release(
        &self,
        record: &ReleaseRecord,
        ignore_rules: &[IgnoreRule],
    ) -> Result<DiffSet>;
}

/// Backend reading directly from a cluster.
#[derive(Debug)]
pub struct ClusterBackend<C: ClusterReader> {
    cluster: C,
    settings: DriftSettings,
}

impl<C: ClusterReader> ClusterBackend<C> {
    /// Creates a backend over `cluster`.
    #[must_use]
    pub const fn new(cluster: C, settings: DriftSettings) -> Self {
        Self { cluster, settings }
    }
}

#[async_trait]
impl<C: ClusterReader> DriftBackend for ClusterBackend<C> {
    async fn declared_resource(&self, name: &str, namespace: &str) -> Result<DeclaredResource> {
        DeclaredStateReader::new(&self.cluster, &self.settings.declared_api_version)
            .read_declared(name, namespace)
            .await
    }

    async fn last_release(&self, release_name: &str, scope: &StorageScope) -> Result<ReleaseRecord> {
        ReleaseLocator::new(&self.cluster, self.settings.storage_driver)
            .locate(release_name, scope)
            .await
    }

    async fn diff_release(
        &self,
        record: &ReleaseRecord,
        ignore_rules: &[IgnoreRule],
    ) -> Result<DiffSet> {
        DiffEngine::new(self.settings.concurrency)
            .diff(record, &self.cluster, ignore_rules)
            .await
    }
}
