//! Cluster access module.
//!
//! This module provides the read-only view of the cluster the drift pipeline
//! depends on, with a Kubernetes API implementation and an in-memory one.

mod kube_reader;
mod memory;
mod reader;

pub use kube_reader::KubeClusterReader;
pub use memory::InMemoryCluster;
pub use reader::{ClusterReader, ObjectRef, StoredEntry};

#[cfg(test)]
pub use reader::MockClusterReader;
