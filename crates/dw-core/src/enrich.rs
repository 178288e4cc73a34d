//! Identity enrichment between backends
//!
//! Before a cross-backend write the object sent to the second backend takes
//! over the identity metadata the first backend assigned, so that both stores
//! describe the same object the same way.

use dw_store::{Object, ObjectList, ObjectMeta};
use std::collections::HashMap;

/// Copy labels, annotations, resource version and uid from `source` onto `dest`
///
/// Labels are replaced wholesale. Annotations are merged, with `source`
/// winning on key collisions.
pub fn enrich_object(source: &ObjectMeta, dest: &mut Object) {
    dest.metadata.labels.clone_from(&source.labels);
    for (key, value) in &source.annotations {
        dest.metadata
            .annotations
            .insert(key.clone(), value.clone());
    }
    dest.metadata
        .resource_version
        .clone_from(&source.resource_version);
    dest.metadata.uid.clone_from(&source.uid);
}

/// Build the object a create sends to the target
///
/// Starts from the caller's original object and enriches it from what legacy
/// stored. A name or namespace legacy filled in (e.g. from `generate_name`) is
/// carried over so both stores agree on identity.
#[must_use]
pub fn enrich_created(original: Object, legacy: &Object) -> Object {
    let mut enriched = original;
    enrich_object(&legacy.metadata, &mut enriched);
    if enriched.metadata.name.is_empty() {
        enriched.metadata.name.clone_from(&legacy.metadata.name);
    }
    if enriched.metadata.namespace.is_none() {
        enriched.metadata.namespace.clone_from(&legacy.metadata.namespace);
    }
    enriched
}

/// Drop backend-local identity so the receiving backend assigns its own
pub fn clear_identity(obj: &mut Object) {
    obj.metadata.resource_version.clear();
    obj.metadata.uid.clear();
}

/// Map each item's name to its position in the list
#[must_use]
pub fn index_by_name(list: &ObjectList) -> HashMap<String, usize> {
    list.items
        .iter()
        .enumerate()
        .map(|(i, obj)| (obj.metadata.name.clone(), i))
        .collect()
}
