//! Ignore rule matching.
//!
//! Rules are compiled once per diff. Selector fields are regular
//! expressions anchored to the whole value; label and annotation
//! selectors are equality-based requirement lists.

use regex::Regex;
use serde_json::Value;

use crate::cluster::ObjectRef;
use crate::declared::{IgnoreRule, Selector};
use crate::error::{DriftError, Result};

use super::diff::PatchOperation;
use super::pointer;

/// Compiled set of ignore rules.
#[derive(Debug, Default)]
pub struct IgnoreMatcher {
    rules: Vec<CompiledRule>,
}

#[derive(Debug)]
struct CompiledRule {
    target: Option<CompiledSelector>,
    /// Parsed path prefixes; empty means the whole object.
    paths: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct CompiledSelector {
    group: Option<Regex>,
    version: Option<Regex>,
    kind: Option<Regex>,
    name: Option<Regex>,
    namespace: Option<Regex>,
    labels: Vec<Requirement>,
    annotations: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

impl IgnoreMatcher {
    /// Compiles `rules`.
    ///
    /// # Errors
    ///
    /// Returns a decode error if a selector pattern, label selector or path
    /// is invalid.
    pub fn new(rules: &[IgnoreRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Whether a rule with no paths selects this object.
    #[must_use]
    pub fn ignores_object(&self, object: &ObjectRef, document: &Value) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.paths.is_empty() && rule.selects(object, document))
    }

    /// Whether the operation at `path` on this object is ignored.
    #[must_use]
    pub fn ignores_path(&self, object: &ObjectRef, document: &Value, path: &str) -> bool {
        let Ok(segments) = pointer::split(path) else {
            return false;
        };
        self.rules.iter().any(|rule| {
            rule.selects(object, document)
                && (rule.paths.is_empty()
                    || rule
                        .paths
                        .iter()
                        .any(|prefix| pointer::is_ancestor_or_self(prefix, &segments)))
        })
    }

    /// Drops the ignored operations of an object.
    #[must_use]
    pub fn retain(
        &self,
        object: &ObjectRef,
        document: &Value,
        operations: Vec<PatchOperation>,
    ) -> Vec<PatchOperation> {
        if self.rules.is_empty() {
            return operations;
        }
        operations
            .into_iter()
            .filter(|op| !self.ignores_path(object, document, &op.path))
            .collect()
    }
}

impl CompiledRule {
    fn compile(rule: &IgnoreRule) -> Result<Self> {
        let target = rule.target.as_ref().map(CompiledSelector::compile).transpose()?;
        let paths = rule
            .paths
            .iter()
            .map(|p| pointer::split(p.trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { target, paths })
    }

    fn selects(&self, object: &ObjectRef, document: &Value) -> bool {
        self.target
            .as_ref()
            .is_none_or(|target| target.matches(object, document))
    }
}

impl CompiledSelector {
    fn compile(selector: &Selector) -> Result<Self> {
        Ok(Self {
            group: pattern(selector.group.as_deref())?,
            version: pattern(selector.version.as_deref())?,
            kind: pattern(selector.kind.as_deref())?,
            name: pattern(selector.name.as_deref())?,
            namespace: pattern(selector.namespace.as_deref())?,
            labels: requirements(selector.label_selector.as_deref())?,
            annotations: requirements(selector.annotation_selector.as_deref())?,
        })
    }

    fn matches(&self, object: &ObjectRef, document: &Value) -> bool {
        let field = |regex: &Option<Regex>, value: &str| regex.as_ref().is_none_or(|r| r.is_match(value));

        field(&self.group, object.group())
            && field(&self.version, object.version())
            && field(&self.kind, &object.kind)
            && field(&self.name, &object.name)
            && field(&self.namespace, object.namespace.as_deref().unwrap_or_default())
            && satisfies(&self.labels, document.pointer("/metadata/labels"))
            && satisfies(&self.annotations, document.pointer("/metadata/annotations"))
    }
}

fn pattern(source: Option<&str>) -> Result<Option<Regex>> {
    match source.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(source) => Regex::new(&format!("^(?:{source})$"))
            .map(Some)
            .map_err(|e| DriftError::decode("ignore rule target", e.to_string())),
    }
}

fn requirements(source: Option<&str>) -> Result<Vec<Requirement>> {
    let Some(source) = source else {
        return Ok(Vec::new());
    };
    source
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(parse_requirement)
        .collect()
}

fn parse_requirement(term: &str) -> Result<Requirement> {
    let invalid = || DriftError::decode("ignore rule selector", format!("invalid requirement '{term}'"));

    let requirement = if let Some(key) = term.strip_prefix('!') {
        Requirement::NotExists(key.trim().to_string())
    } else if let Some((key, value)) = term.split_once("!=") {
        Requirement::NotEquals(key.trim().to_string(), value.trim().to_string())
    } else if let Some((key, value)) = term.split_once("==") {
        Requirement::Equals(key.trim().to_string(), value.trim().to_string())
    } else if let Some((key, value)) = term.split_once('=') {
        Requirement::Equals(key.trim().to_string(), value.trim().to_string())
    } else {
        Requirement::Exists(term.to_string())
    };

    let (Requirement::Equals(key, _)
    | Requirement::NotEquals(key, _)
    | Requirement::Exists(key)
    | Requirement::NotExists(key)) = &requirement;
    if key.is_empty() || key.contains(char::is_whitespace) || key.contains(['(', ')', '=']) {
        return Err(invalid());
    }
    Ok(requirement)
}

fn satisfies(requirements: &[Requirement], values: Option<&Value>) -> bool {
    let lookup = |key: &str| values.and_then(|v| v.get(key)).and_then(Value::as_str);

    requirements.iter().all(|requirement| match requirement {
        Requirement::Equals(key, value) => lookup(key) == Some(value.as_str()),
        Requirement::NotEquals(key, value) => lookup(key) != Some(value.as_str()),
        Requirement::Exists(key) => lookup(key).is_some(),
        Requirement::NotExists(key) => lookup(key).is_none(),
    })
}
