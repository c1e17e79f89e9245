//! Drift computation.
//!
//! This module compares recorded manifest objects against their live
//! counterparts and applies the declared ignore rules.

mod compare;
mod diff;
mod ignore;
pub mod pointer;

pub use compare::compare;
pub use diff::{
    DiffEngine, DiffEntry, DiffSet, DiffType, OperationKind, PatchOperation,
    DRIFT_DETECTION_ANNOTATION, DRIFT_DETECTION_DISABLED,
};
pub use ignore::IgnoreMatcher;
