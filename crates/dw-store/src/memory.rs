//! In-memory object store
//!
//! A complete [`Storage`] implementation backed by an ordered map. It plays
//! either side of a migration in tests and in the simulator, and documents
//! the backend contract by example:
//! - resource versions come from a store-local revision counter
//! - a provided uid is kept, an empty one is filled with a v4 uuid
//! - updates are checked against the stored resource version

use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::object::{Object, ObjectList};
use crate::options::{CreateOptions, DeleteOptions, GetOptions, ListOptions, UpdateOptions};
use crate::storage::{
    run_update_validation, run_validation, Storage, UpdatedObjectInfo, ValidateObjectFn,
    ValidateObjectUpdateFn,
};
use crate::table::{Table, TableOptions};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rand::distr::{Alphanumeric, SampleString};
use std::collections::BTreeMap;

/// Length of the random suffix appended to `generate_name`
const GENERATED_SUFFIX_LEN: usize = 5;

type ObjectKey = (Option<String>, String);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, Object>,
    revision: u64,
    destroyed: bool,
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

/// In-memory backend for a single resource kind
#[derive(Debug)]
pub struct MemoryStorage {
    kind: String,
    singular: String,
    namespaced: bool,
    state: RwLock<State>,
}

impl MemoryStorage {
    /// Create cluster-scoped storage for `kind`
    #[must_use]
    pub fn new(kind: impl Into<String>, singular: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            singular: singular.into(),
            namespaced: false,
            state: RwLock::new(State::default()),
        }
    }

    /// Make objects namespace-scoped
    #[inline]
    #[must_use]
    pub fn namespaced(mut self) -> Self {
        self.namespaced = true;
        self
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().objects.is_empty()
    }

    /// Current store revision
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    fn list_kind(&self) -> String {
        format!("{}List", self.kind)
    }

    fn scope(&self, requested: Option<&str>) -> Option<String> {
        if self.namespaced {
            requested.map(str::to_string)
        } else {
            None
        }
    }

    fn key(&self, ctx: &Context, name: &str) -> ObjectKey {
        (self.scope(ctx.namespace()), name.to_string())
    }

    fn ensure_live(&self, state: &State) -> StoreResult<()> {
        if state.destroyed {
            return Err(StoreError::Unavailable(format!(
                "storage for {} has been destroyed",
                self.kind
            )));
        }
        Ok(())
    }

    fn check_preconditions(&self, obj: &Object, options: &DeleteOptions) -> StoreResult<()> {
        let Some(pre) = &options.preconditions else {
            return Ok(());
        };
        if let Some(uid) = &pre.uid {
            if uid != &obj.metadata.uid {
                return Err(StoreError::conflict(
                    &self.kind,
                    obj.name(),
                    format!("precondition failed: uid {uid} does not match"),
                ));
            }
        }
        if let Some(rv) = &pre.resource_version {
            if rv != &obj.metadata.resource_version {
                return Err(StoreError::conflict(
                    &self.kind,
                    obj.name(),
                    format!("precondition failed: resource version {rv} does not match"),
                ));
            }
        }
        Ok(())
    }

    fn matching_keys(&self, state: &State, ctx: &Context, options: &ListOptions) -> Vec<ObjectKey> {
        let namespace = self.scope(ctx.namespace());
        state
            .objects
            .iter()
            .filter(|((ns, _), obj)| {
                (namespace.is_none() || ns == &namespace) && options.matches(obj)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Stamp a new object and insert it; caller holds the write lock
    fn insert_new(&self, state: &mut State, key: ObjectKey, mut obj: Object) -> Object {
        obj.metadata.namespace.clone_from(&key.0);
        obj.metadata.resource_version = state.next_revision();
        if obj.metadata.uid.is_empty() {
            obj.metadata.uid = uuid::Uuid::new_v4().to_string();
        }
        obj.metadata.generation = 1;
        obj.metadata.creation_timestamp = Some(Utc::now());
        state.objects.insert(key, obj.clone());
        obj
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create(
        &self,
        ctx: &Context,
        mut obj: Object,
        create_validation: Option<&ValidateObjectFn>,
        _options: &CreateOptions,
    ) -> StoreResult<Object> {
        ctx.check()?;

        if obj.kind.is_empty() {
            obj.kind.clone_from(&self.kind);
        }
        if obj.metadata.name.is_empty() && obj.metadata.generate_name.is_none() {
            return Err(StoreError::invalid(
                &self.kind,
                "",
                "name or generateName is required",
            ));
        }

        let namespace = self.scope(obj.namespace().or(ctx.namespace()));
        let mut state = self.state.write();
        self.ensure_live(&state)?;

        if obj.metadata.name.is_empty() {
            let prefix = obj.metadata.generate_name.clone().unwrap_or_default();
            loop {
                let suffix = Alphanumeric
                    .sample_string(&mut rand::rng(), GENERATED_SUFFIX_LEN)
                    .to_lowercase();
                let candidate = format!("{prefix}{suffix}");
                if !state.objects.contains_key(&(namespace.clone(), candidate.clone())) {
                    obj.metadata.name = candidate;
                    break;
                }
            }
        }

        let key = (namespace, obj.metadata.name.clone());
        if state.objects.contains_key(&key) {
            return Err(StoreError::already_exists(&self.kind, &key.1));
        }

        run_validation(create_validation, &obj)?;

        let created = self.insert_new(&mut state, key, obj);
        tracing::trace!(kind = %self.kind, name = %created.name(), "created object");
        Ok(created)
    }

    async fn get(&self, ctx: &Context, name: &str, _options: &GetOptions) -> StoreResult<Object> {
        ctx.check()?;
        let state = self.state.read();
        self.ensure_live(&state)?;

        state
            .objects
            .get(&self.key(ctx, name))
            .cloned()
            .ok_or_else(|| StoreError::not_found(&self.kind, name))
    }

    async fn list(&self, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList> {
        ctx.check()?;
        let state = self.state.read();
        self.ensure_live(&state)?;

        let offset = match &options.continue_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                StoreError::invalid(self.list_kind(), "", "malformed continue token")
            })?,
            None => 0,
        };

        let keys = self.matching_keys(&state, ctx, options);
        let total = keys.len();
        let end = options
            .limit
            .map_or(total, |limit| offset.saturating_add(limit).min(total));

        let items = keys
            .iter()
            .skip(offset)
            .take(end.saturating_sub(offset))
            .filter_map(|key| state.objects.get(key).cloned())
            .collect();

        Ok(ObjectList {
            kind: self.list_kind(),
            resource_version: state.revision.to_string(),
            continue_token: (end < total).then(|| end.to_string()),
            items,
        })
    }

    async fn delete(
        &self,
        ctx: &Context,
        name: &str,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> StoreResult<(Object, bool)> {
        ctx.check()?;
        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let key = self.key(ctx, name);
        let existing = state
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::not_found(&self.kind, name))?;

        self.check_preconditions(existing, options)?;
        run_validation(delete_validation, existing)?;

        let deleted = state
            .objects
            .remove(&key)
            .ok_or_else(|| StoreError::not_found(&self.kind, name))?;
        state.revision += 1;
        tracing::trace!(kind = %self.kind, name, "deleted object");
        Ok((deleted, false))
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> StoreResult<ObjectList> {
        ctx.check()?;
        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let keys = self.matching_keys(&state, ctx, list_options);

        // Nothing is removed unless every match passes.
        for key in &keys {
            if let Some(obj) = state.objects.get(key) {
                self.check_preconditions(obj, options)?;
                run_validation(delete_validation, obj)?;
            }
        }

        let items: Vec<Object> = keys
            .iter()
            .filter_map(|key| state.objects.remove(key))
            .collect();
        if !items.is_empty() {
            state.revision += 1;
        }

        Ok(ObjectList {
            kind: self.list_kind(),
            resource_version: state.revision.to_string(),
            continue_token: None,
            items,
        })
    }

    async fn update(
        &self,
        ctx: &Context,
        name: &str,
        info: &dyn UpdatedObjectInfo,
        create_validation: Option<&ValidateObjectFn>,
        update_validation: Option<&ValidateObjectUpdateFn>,
        force_allow_create: bool,
        _options: &UpdateOptions,
    ) -> StoreResult<(Object, bool)> {
        ctx.check()?;
        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let key = self.key(ctx, name);
        let current = state.objects.get(&key).cloned();
        let mut updated = info.updated_object(current.as_ref())?;

        if updated.kind.is_empty() {
            updated.kind.clone_from(&self.kind);
        }
        if updated.metadata.name.is_empty() {
            updated.metadata.name = name.to_string();
        } else if updated.metadata.name != name {
            return Err(StoreError::invalid(
                &self.kind,
                name,
                format!("metadata.name {} does not match", updated.metadata.name),
            ));
        }

        let Some(old) = current else {
            if !force_allow_create {
                return Err(StoreError::not_found(&self.kind, name));
            }
            run_validation(create_validation, &updated)?;
            let created = self.insert_new(&mut state, key, updated);
            return Ok((created, true));
        };

        let requested = &updated.metadata.resource_version;
        if !requested.is_empty() && requested != &old.metadata.resource_version {
            return Err(StoreError::conflict(
                &self.kind,
                name,
                "the object has been modified; apply changes to the latest version",
            ));
        }

        run_update_validation(update_validation, &updated, &old)?;

        updated.metadata.namespace = old.metadata.namespace.clone();
        updated.metadata.uid = old.metadata.uid.clone();
        updated.metadata.creation_timestamp = old.metadata.creation_timestamp;
        updated.metadata.generation = if updated.spec == old.spec {
            old.metadata.generation
        } else {
            old.metadata.generation + 1
        };
        updated.metadata.resource_version = state.next_revision();

        state.objects.insert(key, updated.clone());
        tracing::trace!(kind = %self.kind, name, "updated object");
        Ok((updated, false))
    }

    async fn convert_to_table(
        &self,
        ctx: &Context,
        objects: &[Object],
        options: &TableOptions,
    ) -> StoreResult<Table> {
        ctx.check()?;
        Ok(Table::from_objects(objects, options))
    }

    fn destroy(&self) {
        let mut state = self.state.write();
        state.objects.clear();
        state.destroyed = true;
    }

    fn new_object(&self) -> Object {
        Object {
            kind: self.kind.clone(),
            ..Object::default()
        }
    }

    fn new_list(&self) -> ObjectList {
        ObjectList::new(self.list_kind())
    }

    fn namespace_scoped(&self) -> bool {
        self.namespaced
    }

    fn singular_name(&self) -> String {
        self.singular.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Preconditions;
    use crate::storage::ReplaceObject;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> MemoryStorage {
        MemoryStorage::new("Playlist", "playlist")
    }

    fn playlist(name: &str) -> Object {
        Object::new("Playlist", name).with_spec(json!({"interval": "5m"}))
    }

    #[tokio::test]
    async fn create_assigns_identity() {
        let store = store();
        let ctx = Context::new();
        let created = store
            .create(&ctx, playlist("a"), None, &CreateOptions::default())
            .await
            .unwrap();

        assert_eq!(created.resource_version(), "1");
        assert!(!created.uid().is_empty());
        assert!(created.metadata.creation_timestamp.is_some());
        assert_eq!(created.metadata.generation, 1);
    }

    #[tokio::test]
    async fn create_keeps_provided_uid() {
        let store = store();
        let mut obj = playlist("a");
        obj.metadata.uid = "legacy-uid".into();
        obj.metadata.resource_version = "99".into();

        let created = store
            .create(&Context::new(), obj, None, &CreateOptions::default())
            .await
            .unwrap();

        assert_eq!(created.uid(), "legacy-uid");
        assert_eq!(created.resource_version(), "1");
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let store = store();
        let ctx = Context::new();
        store
            .create(&ctx, playlist("a"), None, &CreateOptions::default())
            .await
            .unwrap();
        let err = store
            .create(&ctx, playlist("a"), None, &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn create_generates_name() {
        let store = store();
        let mut obj = playlist("");
        obj.metadata.generate_name = Some("pl-".into());

        let created = store
            .create(&Context::new(), obj, None, &CreateOptions::default())
            .await
            .unwrap();

        assert!(created.name().starts_with("pl-"));
        assert_eq!(created.name().len(), 3 + GENERATED_SUFFIX_LEN);
    }

    #[tokio::test]
    async fn create_requires_a_name() {
        let err = store()
            .create(&Context::new(), playlist(""), None, &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid());
    }

    #[tokio::test]
    async fn validation_rejects_before_persisting() {
        let store = store();
        let reject = |obj: &Object| -> StoreResult<()> {
            Err(StoreError::invalid(&obj.kind, obj.name(), "forbidden"))
        };

        let err = store
            .create(&Context::new(), playlist("a"), Some(&reject), &CreateOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_invalid());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let err = store()
            .get(&Context::new(), "nope", &GetOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn cancelled_context_is_observed() {
        let ctx = Context::new();
        ctx.cancel();
        let err = store()
            .create(&ctx, playlist("a"), None, &CreateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
    }

    #[tokio::test]
    async fn list_filters_and_pages() {
        let store = store();
        let ctx = Context::new();
        for (name, team) in [("a", "x"), ("b", "y"), ("c", "x"), ("d", "x")] {
            store
                .create(&ctx, playlist(name).with_label("team", team), None, &CreateOptions::default())
                .await
                .unwrap();
        }

        let options = ListOptions::default().with_label("team", "x").with_limit(2);
        let first = store.list(&ctx, &options).await.unwrap();
        assert_eq!(first.names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(first.kind, "PlaylistList");

        let next = ListOptions {
            continue_token: first.continue_token.clone(),
            ..options
        };
        let second = store.list(&ctx, &next).await.unwrap();
        assert_eq!(second.names().collect::<Vec<_>>(), vec!["d"]);
        assert!(second.continue_token.is_none());
    }

    #[tokio::test]
    async fn namespaced_objects_are_isolated() {
        let store = store().namespaced();
        let team_a = Context::new().with_namespace("a");
        let team_b = Context::new().with_namespace("b");

        store
            .create(&team_a, playlist("p"), None, &CreateOptions::default())
            .await
            .unwrap();

        assert!(store.get(&team_a, "p", &GetOptions::default()).await.is_ok());
        let err = store
            .get(&team_b, "p", &GetOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_checks_preconditions() {
        let store = store();
        let ctx = Context::new();
        store
            .create(&ctx, playlist("a"), None, &CreateOptions::default())
            .await
            .unwrap();

        let stale = DeleteOptions {
            preconditions: Some(Preconditions {
                uid: None,
                resource_version: Some("42".into()),
            }),
        };
        assert!(store.delete(&ctx, "a", None, &stale).await.unwrap_err().is_conflict());

        let (deleted, is_async) = store
            .delete(&ctx, "a", None, &DeleteOptions::default())
            .await
            .unwrap();
        assert_eq!(deleted.name(), "a");
        assert!(!is_async);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_collection_is_all_or_nothing() {
        let store = store();
        let ctx = Context::new();
        for name in ["a", "b"] {
            store
                .create(&ctx, playlist(name), None, &CreateOptions::default())
                .await
                .unwrap();
        }

        let reject_b = |obj: &Object| -> StoreResult<()> {
            if obj.name() == "b" {
                Err(StoreError::invalid(&obj.kind, obj.name(), "protected"))
            } else {
                Ok(())
            }
        };
        let err = store
            .delete_collection(&ctx, Some(&reject_b), &DeleteOptions::default(), &ListOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid());
        assert_eq!(store.len(), 2);

        let deleted = store
            .delete_collection(&ctx, None, &DeleteOptions::default(), &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(deleted.len(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_bumps_version_and_keeps_uid() {
        let store = store();
        let ctx = Context::new();
        let created = store
            .create(&ctx, playlist("a"), None, &CreateOptions::default())
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.spec = json!({"interval": "10m"});
        let (updated, was_created) = store
            .update(&ctx, "a", &ReplaceObject(changed), None, None, false, &UpdateOptions::default())
            .await
            .unwrap();

        assert!(!was_created);
        assert_eq!(updated.uid(), created.uid());
        assert_eq!(updated.metadata.generation, 2);
        assert_ne!(updated.resource_version(), created.resource_version());
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let store = store();
        let ctx = Context::new();
        let created = store
            .create(&ctx, playlist("a"), None, &CreateOptions::default())
            .await
            .unwrap();

        let mut stale = created;
        stale.metadata.resource_version = "1000".into();
        let err = store
            .update(&ctx, "a", &ReplaceObject(stale), None, None, false, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn update_missing_requires_force_create() {
        let store = store();
        let ctx = Context::new();
        let info = ReplaceObject(playlist("a"));

        let err = store
            .update(&ctx, "a", &info, None, None, false, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let (obj, was_created) = store
            .update(&ctx, "a", &info, None, None, true, &UpdateOptions::default())
            .await
            .unwrap();
        assert!(was_created);
        assert_eq!(obj.resource_version(), "1");
    }

    #[tokio::test]
    async fn destroyed_store_is_unavailable() {
        let store = store();
        store.destroy();
        let err = store
            .list(&Context::new(), &ListOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn shape_queries() {
        let store = store();
        assert_eq!(store.new_object().kind, "Playlist");
        assert_eq!(store.new_list().kind, "PlaylistList");
        assert_eq!(store.singular_name(), "playlist");
        assert!(!store.namespace_scoped());
    }
}
