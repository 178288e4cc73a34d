//! Per-call options passed through to backends

use crate::object::{Object, StringMap};
use serde::{Deserialize, Serialize};

/// Options for `create`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Identifies the writer for audit purposes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_manager: Option<String>,
}

/// Options for `get`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOptions {
    /// Requested version, informational only
    #[serde(default)]
    pub resource_version: String,
}

/// Options for `list` and `delete_collection`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    /// Equality label selector; every pair must match
    #[serde(default)]
    pub label_selector: StringMap,

    /// Page size, `None` for unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Continue token from a previous page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,

    /// Requested version, informational only
    #[serde(default)]
    pub resource_version: String,
}

impl ListOptions {
    /// Require a label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_selector.insert(key.into(), value.into());
        self
    }

    /// Set page size
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether an object satisfies the label selector
    #[must_use]
    pub fn matches(&self, obj: &Object) -> bool {
        self.label_selector
            .iter()
            .all(|(k, v)| obj.metadata.labels.get(k) == Some(v))
    }
}

/// Preconditions that must hold before a delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
    /// Required uid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Required resource version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// Options for `delete` and `delete_collection`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Checked against the stored object before deleting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Preconditions>,
}

/// Options for `update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Identifies the writer for audit purposes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_manager: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selector_matches_everything() {
        let obj = Object::new("Playlist", "a");
        assert!(ListOptions::default().matches(&obj));
    }

    #[test]
    fn selector_requires_every_label() {
        let obj = Object::new("Playlist", "a").with_label("team", "x");
        assert!(ListOptions::default().with_label("team", "x").matches(&obj));
        assert!(!ListOptions::default()
            .with_label("team", "x")
            .with_label("env", "prod")
            .matches(&obj));
    }
}
