//! Semantic equality between legacy and target objects
//!
//! Two representations of the same object are equal when every field the
//! caller cares about matches. Backend-assigned bookkeeping is never compared:
//! resource version, uid, generation and creation timestamp.
//!
//! Comparison never fails. Objects that cannot be meaningfully compared
//! (different kinds, one side missing) are reported as unequal.

use dw_store::{Object, ObjectList, StringMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extra fields to ignore on top of the backend-assigned ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Annotations whose key starts with any of these are ignored
    pub ignored_annotation_prefixes: Vec<String>,

    /// Labels with these keys are ignored
    pub ignored_label_keys: Vec<String>,
}

/// Field path reported by [`Comparator::diff`] when one side is absent
pub const ABSENT: &str = "<absent>";

/// Object comparator
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    config: ComparatorConfig,
}

impl Comparator {
    /// Create comparator with ignore lists
    #[inline]
    #[must_use]
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Check whether two optional objects are semantically equal
    ///
    /// Both absent is equal; exactly one absent is unequal.
    #[must_use]
    pub fn compare(&self, a: Option<&Object>, b: Option<&Object>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => self.diff_objects(a, b).is_empty(),
            _ => false,
        }
    }

    /// Field paths that differ between two optional objects
    #[must_use]
    pub fn diff(&self, a: Option<&Object>, b: Option<&Object>) -> Vec<&'static str> {
        match (a, b) {
            (None, None) => Vec::new(),
            (Some(a), Some(b)) => self.diff_objects(a, b),
            _ => vec![ABSENT],
        }
    }

    /// Check whether two lists hold the same objects, ignoring order
    #[must_use]
    pub fn compare_lists(&self, a: &ObjectList, b: &ObjectList) -> bool {
        if a.items.len() != b.items.len() {
            return false;
        }

        let by_identity: HashMap<(Option<&str>, &str), &Object> = b
            .items
            .iter()
            .map(|obj| ((obj.namespace(), obj.name()), obj))
            .collect();

        a.items.iter().all(|obj| {
            by_identity
                .get(&(obj.namespace(), obj.name()))
                .is_some_and(|other| self.diff_objects(obj, other).is_empty())
        })
    }

    fn diff_objects(&self, a: &Object, b: &Object) -> Vec<&'static str> {
        let mut fields = Vec::new();

        // A kind mismatch makes every other field meaningless.
        if a.kind != b.kind {
            fields.push("kind");
            return fields;
        }
        if a.metadata.name != b.metadata.name {
            fields.push("metadata.name");
        }
        if a.metadata.namespace != b.metadata.namespace {
            fields.push("metadata.namespace");
        }
        if !self.labels(&a.metadata.labels).eq(self.labels(&b.metadata.labels)) {
            fields.push("metadata.labels");
        }
        if !self
            .annotations(&a.metadata.annotations)
            .eq(self.annotations(&b.metadata.annotations))
        {
            fields.push("metadata.annotations");
        }
        if a.spec != b.spec {
            fields.push("spec");
        }
        fields
    }

    fn labels<'a>(&'a self, labels: &'a StringMap) -> impl Iterator<Item = (&'a String, &'a String)> {
        labels
            .iter()
            .filter(move |(key, _)| !self.config.ignored_label_keys.iter().any(|k| k == *key))
    }

    fn annotations<'a>(
        &'a self,
        annotations: &'a StringMap,
    ) -> impl Iterator<Item = (&'a String, &'a String)> {
        annotations.iter().filter(move |(key, _)| {
            !self
                .config
                .ignored_annotation_prefixes
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
        })
    }
}

/// Compare with the default comparator
#[inline]
#[must_use]
pub fn compare(a: Option<&Object>, b: Option<&Object>) -> bool {
    Comparator::default().compare(a, b)
}
