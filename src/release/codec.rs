//! Helm release record codec.
//!
//! Helm stores a release as base64 text of a gzip-compressed JSON document.
//! The manifest inside it is a multi-document YAML stream.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use serde_json::Value;
use std::io::{Read, Write};

use crate::cluster::ObjectRef;
use crate::error::{DriftError, Result};

use super::types::{ManifestObject, ReleasePayload};

/// Leading bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decodes a stored release payload into Helm's release document.
///
/// # Errors
///
/// Returns a decode error if the payload is not valid base64, gzip, or
/// release JSON.
pub(crate) fn decode_payload(entry_name: &str, payload: &[u8]) -> Result<ReleasePayload> {
    let what = || format!("release record {entry_name}");

    let text = payload.trim_ascii();
    if text.is_empty() {
        return Err(DriftError::decode(what(), "no release data"));
    }

    let raw = STANDARD
        .decode(text)
        .map_err(|e| DriftError::decode(what(), format!("invalid base64: {e}")))?;

    let json = if raw.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| DriftError::decode(what(), format!("invalid gzip stream: {e}")))?;
        inflated
    } else {
        raw
    };

    serde_json::from_slice(&json)
        .map_err(|e| DriftError::decode(what(), format!("invalid release JSON: {e}")))
}

/// Encodes a release document the way Helm's storage drivers do.
///
/// # Errors
///
/// Returns a decode error if the document cannot be serialized or
/// compressed.
pub fn encode_release(release: &Value) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(release)
        .map_err(|e| DriftError::decode("release document", e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| DriftError::decode("release document", e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| DriftError::decode("release document", e.to_string()))?;

    Ok(STANDARD.encode(compressed).into_bytes())
}

/// Splits a rendered manifest into objects, in document order.
///
/// Empty documents are skipped and `v1` `List` documents are flattened
/// into their items.
///
/// # Errors
///
/// Returns a decode error if a document is not valid YAML, is not a mapping,
/// or lacks an identity.
pub fn parse_manifest(manifest: &str) -> Result<Vec<ManifestObject>> {
    let mut objects = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
        let value = Value::deserialize(document).map_err(|e| {
            DriftError::decode(format!("manifest document {}", index + 1), e.to_string())
        })?;

        match value {
            Value::Null => {}
            Value::Object(_) if is_list(&value) => {
                if let Some(Value::Array(items)) = value.get("items") {
                    for item in items {
                        objects.push(manifest_object(item.clone())?);
                    }
                }
            }
            Value::Object(_) => objects.push(manifest_object(value)?),
            other => {
                return Err(DriftError::decode(
                    format!("manifest document {}", index + 1),
                    format!("expected a mapping, found {}", json_type(&other)),
                ));
            }
        }
    }

    Ok(objects)
}

fn manifest_object(document: Value) -> Result<ManifestObject> {
    let object = ObjectRef::from_document(&document)?;
    Ok(ManifestObject { object, document })
}

fn is_list(value: &Value) -> bool {
    value.get("apiVersion").and_then(Value::as_str) == Some("v1")
        && value.get("kind").and_then(Value::as_str) == Some("List")
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}
