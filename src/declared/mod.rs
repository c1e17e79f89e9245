//! Declared state.
//!
//! This module reads the Flux `HelmRelease` resource that declares how a
//! release should behave, including its drift ignore rules.

mod reader;
mod types;

pub use reader::{DeclaredStateReader, DECLARED_KIND};
pub use types::{
    DeclaredMetadata, DeclaredResource, DeclaredSpec, DriftDetection, DriftMode, IgnoreRule,
    Selector,
};
