// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Helm Drift Detect
//!
//! Detects configuration drift between the manifest a Helm release last
//! deployed and the objects currently running in a Kubernetes cluster.
//!
//! ## Overview
//!
//! A Flux `HelmRelease` declares how a release should behave. This crate:
//!
//! - Reads the `HelmRelease` for its release name, storage namespace and
//!   drift ignore rules
//! - Locates the latest Helm release record (Secret or `ConfigMap` storage)
//! - Compares every recorded object against its live counterpart
//! - Renders a numbered report of missing and changed objects
//!
//! ## Architecture
//!
//! 1. **Declared State**: the `HelmRelease` resource
//! 2. **Recorded State**: the manifest stored in the latest Helm release
//! 3. **Live State**: the objects queried from the cluster
//! 4. **Detector**: sequences the reads, the diff and the report
//!
//! ## Modules
//!
//! - [`cluster`]: Read-only cluster access (Kubernetes API, in-memory)
//! - [`release`]: Helm release record location and decoding
//! - [`declared`]: `HelmRelease` reading
//! - [`drift`]: Structural diff and ignore rules
//! - [`report`]: Report rendering and sinks
//! - [`backend`]: Capability set used by the detector
//! - [`detector`]: Drift detection pipeline
//! - [`config`]: Run settings
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```text
//! $ helm-drift -n descheduler -r descheduler
//! Detected drift in HelmRelease descheduler/descheduler:
//!
//! 1 - Resource: Deployment/descheduler
//!     Reason: changed
//!     1 - Path: /spec/template/spec/containers/0/resources/requests
//!         Recovery Operation: replace
//!         Original Value: map[cpu:500m memory:256Mi]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backend;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod declared;
pub mod detector;
pub mod drift;
pub mod error;
pub mod release;
pub mod report;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{ClusterBackend, DriftBackend};
pub use cli::{Cli, OutputFormatter};
pub use cluster::{ClusterReader, InMemoryCluster, KubeClusterReader, ObjectRef};
pub use config::{DriftSettings, SettingsParser, StorageDriver};
pub use declared::{DeclaredResource, DeclaredStateReader, IgnoreRule, Selector};
pub use detector::{DriftDetector, DriftOutcome};
pub use drift::{DiffEngine, DiffEntry, DiffSet, DiffType, OperationKind, PatchOperation};
pub use error::{DriftError, ErrorKind, Result};
pub use release::{ReleaseLocator, ReleaseRecord, StorageScope};
pub use report::{Report, ReportRenderer, ReportSink, TracingSink, WriterSink};
