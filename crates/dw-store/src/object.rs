//! Resource object model
//!
//! A [`Object`] is identified by its name and optional namespace. The
//! `resource_version` and `uid` fields are assigned by whichever backend
//! persists the object and are not expected to agree between backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value map used for labels and annotations
pub type StringMap = BTreeMap<String, String>;

/// Identity and bookkeeping metadata of a resource object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Unique name within the namespace
    #[serde(default)]
    pub name: String,

    /// Prefix for a server-generated name when `name` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    /// Namespace, `None` for cluster-scoped resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Backend-local opaque version, changes on every write
    #[serde(default)]
    pub resource_version: String,

    /// Backend-local unique id
    #[serde(default)]
    pub uid: String,

    /// Write counter maintained by the backend
    #[serde(default)]
    pub generation: i64,

    /// Set by the backend on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Identifying labels
    #[serde(default)]
    pub labels: StringMap,

    /// Non-identifying annotations
    #[serde(default)]
    pub annotations: StringMap,
}

impl ObjectMeta {
    /// Create metadata with a name
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A resource object as stored by a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Resource kind, e.g. `Playlist`
    pub kind: String,

    /// Metadata
    pub metadata: ObjectMeta,

    /// Backend-specific payload
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl Object {
    /// Create object of `kind` named `name` with an empty payload
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            metadata: ObjectMeta::named(name),
            spec: serde_json::Value::Null,
        }
    }

    /// Set payload
    #[inline]
    #[must_use]
    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = spec;
        self
    }

    /// Set namespace
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    /// Add a label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    #[inline]
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// Object name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Object namespace
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Backend-assigned resource version
    #[inline]
    #[must_use]
    pub fn resource_version(&self) -> &str {
        &self.metadata.resource_version
    }

    /// Backend-assigned uid
    #[inline]
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }
}

/// Ordered collection of objects returned by list-style calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList {
    /// List kind, e.g. `PlaylistList`
    pub kind: String,

    /// Store revision the list was read at
    #[serde(default)]
    pub resource_version: String,

    /// Token for the next page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,

    /// Items in backend order
    #[serde(default)]
    pub items: Vec<Object>,
}

impl ObjectList {
    /// Create empty list of `kind`
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Create list with items
    #[must_use]
    pub fn with_items(kind: impl Into<String>, items: Vec<Object>) -> Self {
        Self {
            kind: kind.into(),
            items,
            ..Self::default()
        }
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Names of all items in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(Object::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_fields() {
        let obj = Object::new("Playlist", "morning")
            .with_namespace("default")
            .with_label("team", "a")
            .with_annotation("note", "x")
            .with_spec(json!({"interval": "5m"}));

        assert_eq!(obj.name(), "morning");
        assert_eq!(obj.namespace(), Some("default"));
        assert_eq!(obj.metadata.labels.get("team").map(String::as_str), Some("a"));
        assert_eq!(obj.spec["interval"], "5m");
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let mut obj = Object::new("Playlist", "a");
        obj.metadata.resource_version = "7".into();
        let value = serde_json::to_value(&obj).unwrap();
        assert_eq!(value["metadata"]["resourceVersion"], "7");
    }

    #[test]
    fn list_names_in_order() {
        let list = ObjectList::with_items(
            "PlaylistList",
            vec![Object::new("Playlist", "b"), Object::new("Playlist", "a")],
        );
        assert_eq!(list.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(list.len(), 2);
    }
}
