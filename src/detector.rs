//! Drift detector for a single Helm release.
//!
//! This module implements the detection pipeline: read the declared
//! `HelmRelease`, locate the last release record, diff it against the live
//! cluster, and emit the rendered report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::DriftBackend;
use crate::config::DriftSettings;
use crate::declared::{DeclaredResource, DriftMode};
use crate::drift::DiffSet;
use crate::error::{Result, ResultExt};
use crate::release::StorageScope;
use crate::report::{Report, ReportRenderer, ReportSink};

/// Detects drift of Helm releases.
pub struct DriftDetector<'a, B: DriftBackend, S: ReportSink> {
    /// Backend providing cluster state.
    backend: &'a B,
    /// Run settings.
    settings: &'a DriftSettings,
    /// Report renderer.
    renderer: ReportRenderer,
    /// Destination of rendered reports.
    sink: S,
}

/// Result of a drift detection run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftOutcome {
    /// Name of the declared `HelmRelease`.
    pub name: String,
    /// Namespace of the declared `HelmRelease`.
    pub namespace: String,
    /// Resolved Helm release name.
    pub release_name: String,
    /// Namespace the release record was found in.
    pub storage_namespace: String,
    /// Revision of the release record.
    pub revision: u64,
    /// Chart of the release, as `name-version`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    /// When the revision was deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_deployed: Option<DateTime<Utc>>,
    /// Drift detection mode declared on the `HelmRelease`.
    pub mode: DriftMode,
    /// Drifted objects.
    pub drift: DiffSet,
    /// Rendered report.
    #[serde(skip)]
    pub report: Report,
}

impl DriftOutcome {
    /// Whether any drift was detected.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.drift.has_changes()
    }
}

impl<'a, B: DriftBackend, S: ReportSink> DriftDetector<'a, B, S> {
    /// Creates a new drift detector.
    #[must_use]
    pub const fn new(backend: &'a B, settings: &'a DriftSettings, sink: S) -> Self {
        Self {
            backend,
            settings,
            renderer: ReportRenderer::new(),
            sink,
        }
    }

    /// Returns the sink, consuming the detector.
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Detects drift of the `HelmRelease` `name` in `namespace`.
    ///
    /// Nothing is emitted to the sink unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step, wrapped with the step
    /// that failed.
    pub async fn run(&mut self, name: &str, namespace: &str) -> Result<DriftOutcome> {
        info!("Detecting drift of HelmRelease {namespace}/{name}");

        let declared = self
            .backend
            .declared_resource(name, namespace)
            .await
            .context("read declared state")?;

        let mode = declared.drift_mode();
        if mode == DriftMode::Disabled {
            warn!("Drift detection is disabled for HelmRelease {namespace}/{name}; checking anyway");
        }

        let release_name = declared.release_name(name).to_string();
        let scope = self.storage_scope(&declared, namespace);
        debug!("Resolved release {release_name} with scope {scope:?}");

        let record = self
            .backend
            .last_release(&release_name, &scope)
            .await
            .context("locate release")?;

        let drift = self
            .backend
            .diff_release(&record, declared.ignore_rules())
            .await
            .context("compute drift")?;

        let report = self.renderer.render(&drift, &release_name, namespace);
        self.sink.emit(&report)?;

        if drift.has_changes() {
            info!("HelmRelease {namespace}/{name} has drifted ({} objects)", drift.len());
        } else {
            info!("HelmRelease {namespace}/{name} is in sync");
        }

        Ok(DriftOutcome {
            name: name.to_string(),
            namespace: namespace.to_string(),
            release_name,
            storage_namespace: record.storage_namespace,
            revision: record.version,
            chart: record.chart,
            last_deployed: record.last_deployed,
            mode,
            drift,
            report,
        })
    }

    fn storage_scope(&self, declared: &DeclaredResource, namespace: &str) -> StorageScope {
        match declared.storage_namespace() {
            Some(storage) => StorageScope::Namespace(storage.to_string()),
            None if self.settings.discover_storage => StorageScope::Discover,
            None => StorageScope::Namespace(namespace.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockDriftBackend;
    use crate::cluster::ObjectRef;
    use crate::declared::{DeclaredSpec, DriftDetection, IgnoreRule, Selector};
    use crate::drift::{DiffEntry, DiffType, OperationKind, PatchOperation};
    use crate::error::{DriftError, ErrorKind};
    use crate::release::ReleaseRecord;
    use serde_json::json;

    fn record(name: &str, storage_namespace: &str) -> ReleaseRecord {
        ReleaseRecord {
            name: name.to_string(),
            storage_namespace: storage_namespace.to_string(),
            namespace: storage_namespace.to_string(),
            version: 4,
            status: Some(String::from("deployed")),
            chart: None,
            last_deployed: None,
            manifest: Vec::new(),
        }
    }

    fn declared(spec: DeclaredSpec) -> DeclaredResource {
        DeclaredResource {
            spec,
            ..DeclaredResource::default()
        }
    }

    fn drifted() -> DiffSet {
        DiffSet::new(vec![DiffEntry {
            object: ObjectRef::new("apps/v1", "Deployment", Some("descheduler"), "descheduler"),
            diff_type: DiffType::Update,
            patch: vec![PatchOperation {
                path: String::from("/spec/template/spec/containers/0/resources/requests"),
                op: OperationKind::Replace,
                original: Some(json!({ "cpu": "500m", "memory": "256Mi" })),
            }],
        }])
    }

    #[tokio::test]
    async fn test_run_emits_report() {
        let mut backend = MockDriftBackend::new();
        backend
            .expect_declared_resource()
            .returning(|_, _| Ok(declared(DeclaredSpec::default())));
        backend
            .expect_last_release()
            .withf(|name, scope| {
                name == "descheduler"
                    && *scope == StorageScope::Namespace(String::from("descheduler"))
            })
            .returning(|name, _| Ok(record(name, "descheduler")));
        backend.expect_diff_release().returning(|_, _| Ok(drifted()));

        let settings = DriftSettings::default();
        let mut detector = DriftDetector::new(&backend, &settings, Vec::new());
        let outcome = detector.run("descheduler", "descheduler").await.unwrap();

        assert!(outcome.has_drift());
        assert_eq!(outcome.revision, 4);
        let lines = detector.into_sink();
        assert_eq!(lines[0], "Detected drift in HelmRelease descheduler/descheduler:");
        assert_eq!(lines.len(), 7);
    }

    #[tokio::test]
    async fn test_declared_overrides_rebind_release() {
        let mut backend = MockDriftBackend::new();
        backend.expect_declared_resource().returning(|_, _| {
            Ok(declared(DeclaredSpec {
                release_name: Some(String::from("web-prod")),
                storage_namespace: Some(String::from("helm")),
                ..DeclaredSpec::default()
            }))
        });
        backend
            .expect_last_release()
            .withf(|name, scope| {
                name == "web-prod" && *scope == StorageScope::Namespace(String::from("helm"))
            })
            .times(1)
            .returning(|name, _| Ok(record(name, "helm")));
        backend
            .expect_diff_release()
            .returning(|_, _| Ok(DiffSet::default()));

        let settings = DriftSettings::default();
        let mut detector = DriftDetector::new(&backend, &settings, Vec::new());
        let outcome = detector.run("web", "flux-system").await.unwrap();

        assert!(!outcome.has_drift());
        assert_eq!(outcome.storage_namespace, "helm");
        assert_eq!(detector.into_sink(), vec![String::from("No drift detected in flux-system/web-prod")]);
    }

    #[tokio::test]
    async fn test_discover_used_without_storage_override() {
        let mut backend = MockDriftBackend::new();
        backend
            .expect_declared_resource()
            .returning(|_, _| Ok(declared(DeclaredSpec::default())));
        backend
            .expect_last_release()
            .withf(|_, scope| *scope == StorageScope::Discover)
            .times(1)
            .returning(|name, _| Ok(record(name, "elsewhere")));
        backend
            .expect_diff_release()
            .returning(|_, _| Ok(DiffSet::default()));

        let settings = DriftSettings {
            discover_storage: true,
            ..DriftSettings::default()
        };
        let mut detector = DriftDetector::new(&backend, &settings, Vec::new());
        let outcome = detector.run("web", "flux-system").await.unwrap();
        assert_eq!(outcome.storage_namespace, "elsewhere");
    }

    #[tokio::test]
    async fn test_ignore_rules_are_passed_to_diff() {
        let mut backend = MockDriftBackend::new();
        backend.expect_declared_resource().returning(|_, _| {
            Ok(declared(DeclaredSpec {
                drift_detection: Some(DriftDetection {
                    mode: DriftMode::Warn,
                    ignore: vec![IgnoreRule::new(
                        Some(Selector::kind_name("Deployment", "descheduler")),
                        &["/spec/template"],
                    )],
                }),
                ..DeclaredSpec::default()
            }))
        });
        backend
            .expect_last_release()
            .returning(|name, _| Ok(record(name, "descheduler")));
        backend
            .expect_diff_release()
            .withf(|_, rules| rules.len() == 1 && rules[0].paths == ["/spec/template"])
            .returning(|_, _| Ok(DiffSet::default()));

        let settings = DriftSettings::default();
        let mut detector = DriftDetector::new(&backend, &settings, Vec::new());
        let outcome = detector.run("descheduler", "descheduler").await.unwrap();
        assert_eq!(outcome.mode, DriftMode::Warn);
        assert!(!outcome.has_drift());
    }

    #[tokio::test]
    async fn test_failure_emits_nothing() {
        let mut backend = MockDriftBackend::new();
        backend
            .expect_declared_resource()
            .returning(|_, _| Ok(declared(DeclaredSpec::default())));
        backend
            .expect_last_release()
            .returning(|name, _| Err(DriftError::not_found("Helm release", name, None)));
        backend.expect_diff_release().never();

        let settings = DriftSettings::default();
        let mut detector = DriftDetector::new(&backend, &settings, Vec::new());
        let err = detector.run("x", "default").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "failed to locate release: Helm release x not found");
        assert!(detector.into_sink().is_empty());
    }

    #[tokio::test]
    async fn test_missing_declared_resource_aborts() {
        let mut backend = MockDriftBackend::new();
        backend
            .expect_declared_resource()
            .returning(|name, ns| Err(DriftError::not_found("HelmRelease", name, Some(ns))));
        backend.expect_last_release().never();

        let settings = DriftSettings::default();
        let mut detector = DriftDetector::new(&backend, &settings, Vec::new());
        let err = detector.run("web", "apps").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("HelmRelease apps/web not found"));
    }

    mod pipeline {
        use super::*;
        use crate::backend::ClusterBackend;
        use crate::cluster::{InMemoryCluster, StoredEntry};
        use crate::config::{StorageDriver, DEFAULT_DECLARED_API_VERSION};
        use crate::release::encode_release;
        use serde_json::Value;

        const MANIFEST: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: descheduler
spec:
  replicas: 1
  template:
    spec:
      containers:
        - name: descheduler
          image: descheduler:v0.29.0
          resources:
            requests:
              cpu: 500m
              memory: 256Mi
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: descheduler
rules: []
";

        /// A deployed descheduler release whose live Deployment requests
        /// `cpu`, governed by a `HelmRelease` with `ignore` rules.
        fn cluster(cpu: &str, ignore: Value) -> InMemoryCluster {
            let release = json!({
                "name": "descheduler",
                "namespace": "descheduler",
                "version": 3,
                "manifest": MANIFEST,
                "info": { "status": "deployed", "last_deployed": "2024-05-01T10:00:00Z" },
                "chart": { "metadata": { "name": "descheduler", "version": "0.29.0" } }
            });
            let mut cluster = InMemoryCluster::new()
                .with_document(json!({
                    "apiVersion": DEFAULT_DECLARED_API_VERSION,
                    "kind": "HelmRelease",
                    "metadata": { "name": "descheduler", "namespace": "descheduler" },
                    "spec": { "driftDetection": { "mode": "enabled", "ignore": ignore } }
                }))
                .unwrap()
                .with_document(json!({
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "metadata": { "name": "descheduler", "namespace": "descheduler", "uid": "0b6f" },
                    "spec": {
                        "replicas": 1,
                        "template": { "spec": { "containers": [{
                            "name": "descheduler",
                            "image": "descheduler:v0.29.0",
                            "imagePullPolicy": "IfNotPresent",
                            "resources": { "requests": { "cpu": cpu, "memory": "256Mi" } }
                        }] } }
                    }
                }))
                .unwrap()
                .with_document(json!({
                    "apiVersion": "rbac.authorization.k8s.io/v1",
                    "kind": "ClusterRole",
                    "metadata": { "name": "descheduler" },
                    "rules": []
                }))
                .unwrap();
            cluster.insert_entry(
                StorageDriver::Secret,
                "descheduler",
                StoredEntry {
                    name: String::from("sh.helm.release.v1.descheduler.v3"),
                    payload: encode_release(&release).unwrap(),
                },
            );
            cluster
        }

        async fn detect(cluster: InMemoryCluster) -> (Result<DriftOutcome>, Vec<String>) {
            let settings = DriftSettings::default();
            let backend = ClusterBackend::new(cluster, settings.clone());
            let mut detector = DriftDetector::new(&backend, &settings, Vec::new());
            let outcome = detector.run("descheduler", "descheduler").await;
            (outcome, detector.into_sink())
        }

        #[tokio::test]
        async fn test_changed_requests_render_recovery_steps() {
            let (outcome, lines) = detect(cluster("100m", json!([]))).await;
            let outcome = outcome.unwrap();

            assert!(outcome.has_drift());
            assert_eq!(outcome.revision, 3);
            assert_eq!(outcome.chart.as_deref(), Some("descheduler-0.29.0"));
            assert!(outcome.last_deployed.is_some());
            assert_eq!(
                lines,
                [
                    "Detected drift in HelmRelease descheduler/descheduler:",
                    "",
                    "1 - Resource: Deployment/descheduler",
                    "    Reason: changed",
                    "    1 - Path: /spec/template/spec/containers/0/resources/requests/cpu",
                    "        Recovery Operation: replace",
                    "        Original Value: 100m",
                ]
            );
        }

        #[tokio::test]
        async fn test_ignored_template_reports_no_drift() {
            let ignore = json!([{
                "paths": ["/spec/template"],
                "target": { "kind": "Deployment", "name": "descheduler" }
            }]);
            let (outcome, lines) = detect(cluster("100m", ignore)).await;

            assert!(!outcome.unwrap().has_drift());
            assert_eq!(lines, ["No drift detected in descheduler/descheduler"]);
        }

        #[tokio::test]
        async fn test_in_sync_release_reports_no_drift() {
            let (outcome, lines) = detect(cluster("500m", json!([]))).await;

            assert!(!outcome.unwrap().has_drift());
            assert_eq!(lines, ["No drift detected in descheduler/descheduler"]);
        }

        #[tokio::test]
        async fn test_missing_release_record_emits_nothing() {
            // The record is stored as a Secret, the run looks for ConfigMaps.
            let cluster = cluster("100m", json!([]));
            let settings = DriftSettings {
                storage_driver: StorageDriver::ConfigMap,
                ..DriftSettings::default()
            };
            let backend = ClusterBackend::new(cluster, settings.clone());
            let mut detector = DriftDetector::new(&backend, &settings, Vec::new());

            let err = detector.run("descheduler", "descheduler").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert_eq!(
                err.to_string(),
                "failed to locate release: Helm release descheduler/descheduler not found"
            );
            assert!(detector.into_sink().is_empty());
        }
    }
}
