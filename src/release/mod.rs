//! Helm release records.
//!
//! This module reads the release records Helm persists in the cluster:
//! locating the storage namespace, selecting the latest revision, and
//! decoding its rendered manifest.

mod codec;
mod locator;
mod types;

pub use codec::{encode_release, parse_manifest};
pub use locator::{ReleaseLocator, StorageScope};
pub use types::{ManifestObject, ReleaseRecord, STORAGE_PREFIX};
