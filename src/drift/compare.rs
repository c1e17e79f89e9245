//! Structural comparison of declared and live documents.
//!
//! Only fields present in the declared document are compared. Operations
//! describe how to move the live document back to the declared one.
//!
//! Values are compared as JSON. Kubernetes quantities are not normalised,
//! so a declared `cpu: 1` against a live `"1"` is a `replace`. Empty maps
//! and lists match an absent live field, as the API server omits them.

use serde_json::{Number, Value};

use super::diff::{OperationKind, PatchOperation};
use super::pointer;

/// Compares `declared` against `live`, in declared field order.
#[must_use]
pub fn compare(declared: &Value, live: &Value) -> Vec<PatchOperation> {
    let mut operations = Vec::new();
    let mut path = Vec::new();
    compare_at(&mut path, declared, live, &mut operations);
    operations
}

fn compare_at(
    path: &mut Vec<String>,
    declared: &Value,
    live: &Value,
    operations: &mut Vec<PatchOperation>,
) {
    match (declared, live) {
        // A declared null is not a declared value.
        (Value::Null, _) => {}
        (Value::Object(declared), Value::Object(live)) => {
            for (key, declared_value) in declared {
                if declared_value.is_null() {
                    continue;
                }
                path.push(key.clone());
                match live.get(key) {
                    Some(live_value) => compare_at(path, declared_value, live_value, operations),
                    None if is_empty_container(declared_value) => {}
                    None => operations.push(operation(path, OperationKind::Add, None)),
                }
                path.pop();
            }
        }
        (Value::Array(declared), Value::Array(live)) => {
            for (index, declared_value) in declared.iter().enumerate() {
                path.push(index.to_string());
                match live.get(index) {
                    Some(live_value) => compare_at(path, declared_value, live_value, operations),
                    None if !declared_value.is_null() => {
                        operations.push(operation(path, OperationKind::Add, None));
                    }
                    None => {}
                }
                path.pop();
            }
            for (index, live_value) in live.iter().enumerate().skip(declared.len()) {
                path.push(index.to_string());
                operations.push(operation(
                    path,
                    OperationKind::Remove,
                    Some(live_value.clone()),
                ));
                path.pop();
            }
        }
        (Value::Number(declared), Value::Number(live)) => {
            if !numbers_equal(declared, live) {
                operations.push(operation(
                    path,
                    OperationKind::Replace,
                    Some(Value::Number(live.clone())),
                ));
            }
        }
        (declared, live) => {
            if declared != live {
                operations.push(operation(path, OperationKind::Replace, Some(live.clone())));
            }
        }
    }
}

fn operation(path: &[String], op: OperationKind, original: Option<Value>) -> PatchOperation {
    PatchOperation {
        path: pointer::join(path),
        op,
        original,
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
