//! Testing utilities for the dual-write workspace
//!
//! Shared fixtures, a capturing recorder and a probing storage wrapper.

#![allow(missing_docs)]

use async_trait::async_trait;
use dw_core::{DualWriter, DualWriterMode, DualWriterOptions, OutcomeRecorder};
use dw_store::{
    Context, CreateOptions, DeleteOptions, GetOptions, ListOptions, MemoryStorage, Object,
    ObjectList, Storage, StoreError, StoreResult, Table, TableOptions, UpdateOptions,
    UpdatedObjectInfo, ValidateObjectFn, ValidateObjectUpdateFn,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub const KIND: &str = "Playlist";
pub const RESOURCE: &str = "playlists";

pub fn playlist(name: &str) -> Object {
    Object::new(KIND, name)
        .with_label("team", "alerting")
        .with_annotation("grafana.app/owner", "ops")
        .with_spec(json!({"interval": "5m", "items": [{"type": "dashboard_by_uid", "value": name}]}))
}

pub fn memory_store() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new(KIND, "playlist"))
}

/// Fresh `(legacy, target)` pair
pub fn memory_pair() -> (Arc<MemoryStorage>, Arc<MemoryStorage>) {
    (memory_store(), memory_store())
}

pub async fn seed(store: &dyn Storage, objects: impl IntoIterator<Item = Object>) -> StoreResult<()> {
    let ctx = Context::new();
    for obj in objects {
        store.create(&ctx, obj, None, &CreateOptions::default()).await?;
    }
    Ok(())
}

pub fn writer(
    mode: DualWriterMode,
    legacy: Arc<dyn Storage>,
    storage: Arc<dyn Storage>,
    recorder: Arc<dyn OutcomeRecorder>,
) -> DualWriter {
    DualWriter::new(
        mode,
        legacy,
        storage,
        recorder,
        RESOURCE,
        DualWriterOptions::default(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    LegacyDuration {
        failed: bool,
        mode: DualWriterMode,
        method: String,
    },
    StorageDuration {
        failed: bool,
        mode: DualWriterMode,
        method: String,
    },
    Outcome {
        mode: DualWriterMode,
        name: String,
        equal: bool,
        method: String,
    },
}

/// Recorder that keeps every call for later assertions
#[derive(Debug, Default)]
pub struct FakeRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl FakeRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// `(name, equal)` for every outcome recorded under `method`
    pub fn outcomes(&self, method: &str) -> Vec<(String, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Outcome {
                    name,
                    equal,
                    method: m,
                    ..
                } if m == method => Some((name.clone(), *equal)),
                _ => None,
            })
            .collect()
    }

    /// Failure flags of legacy durations recorded under `method`
    pub fn legacy_durations(&self, method: &str) -> Vec<bool> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::LegacyDuration {
                    failed, method: m, ..
                } if m == method => Some(*failed),
                _ => None,
            })
            .collect()
    }

    /// Failure flags of target durations recorded under `method`
    pub fn storage_durations(&self, method: &str) -> Vec<bool> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::StorageDuration {
                    failed, method: m, ..
                } if m == method => Some(*failed),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl OutcomeRecorder for FakeRecorder {
    fn record_legacy_duration(
        &self,
        failed: bool,
        mode: DualWriterMode,
        _resource: &str,
        method: &str,
        _start: Instant,
    ) {
        self.events.lock().push(RecordedEvent::LegacyDuration {
            failed,
            mode,
            method: method.to_string(),
        });
    }

    fn record_storage_duration(
        &self,
        failed: bool,
        mode: DualWriterMode,
        _resource: &str,
        method: &str,
        _start: Instant,
    ) {
        self.events.lock().push(RecordedEvent::StorageDuration {
            failed,
            mode,
            method: method.to_string(),
        });
    }

    fn record_outcome(&self, mode: DualWriterMode, _resource: &str, name: &str, equal: bool, method: &str) {
        self.events.lock().push(RecordedEvent::Outcome {
            mode,
            name: name.to_string(),
            equal,
            method: method.to_string(),
        });
    }
}

/// An update as seen by the wrapped backend
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCall {
    pub name: String,
    /// What the update would write over an absent object
    pub object: Object,
    pub force_allow_create: bool,
}

/// Storage wrapper that records calls and can inject failures
///
/// Method keys match the recorder's labels: `create`, `get`, `list`,
/// `delete`, `delete-collection`, `update`.
#[derive(Debug)]
pub struct ProbeStorage {
    inner: Arc<dyn Storage>,
    faults: Mutex<HashMap<String, StoreError>>,
    calls: Mutex<HashMap<String, usize>>,
    created: Mutex<Vec<Object>>,
    updates: Mutex<Vec<UpdateCall>>,
}

impl ProbeStorage {
    pub fn wrap(inner: Arc<dyn Storage>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        })
    }

    /// Make every later call to `method` fail with `err`
    pub fn fail_on(&self, method: &str, err: StoreError) {
        self.faults.lock().insert(method.to_string(), err);
    }

    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    /// Objects passed to `create`, in call order
    pub fn created(&self) -> Vec<Object> {
        self.created.lock().clone()
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.updates.lock().clone()
    }

    fn enter(&self, method: &str) -> StoreResult<()> {
        *self.calls.lock().entry(method.to_string()).or_insert(0) += 1;
        match self.faults.lock().get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Storage for ProbeStorage {
    async fn create(
        &self,
        ctx: &Context,
        obj: Object,
        create_validation: Option<&ValidateObjectFn>,
        options: &CreateOptions,
    ) -> StoreResult<Object> {
        self.created.lock().push(obj.clone());
        self.enter("create")?;
        self.inner.create(ctx, obj, create_validation, options).await
    }

    async fn get(&self, ctx: &Context, name: &str, options: &GetOptions) -> StoreResult<Object> {
        self.enter("get")?;
        self.inner.get(ctx, name, options).await
    }

    async fn list(&self, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList> {
        self.enter("list")?;
        self.inner.list(ctx, options).await
    }

    async fn delete(
        &self,
        ctx: &Context,
        name: &str,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> StoreResult<(Object, bool)> {
        self.enter("delete")?;
        self.inner.delete(ctx, name, delete_validation, options).await
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> StoreResult<ObjectList> {
        self.enter("delete-collection")?;
        self.inner
            .delete_collection(ctx, delete_validation, options, list_options)
            .await
    }

    async fn update(
        &self,
        ctx: &Context,
        name: &str,
        info: &dyn UpdatedObjectInfo,
        create_validation: Option<&ValidateObjectFn>,
        update_validation: Option<&ValidateObjectUpdateFn>,
        force_allow_create: bool,
        options: &UpdateOptions,
    ) -> StoreResult<(Object, bool)> {
        if let Ok(object) = info.updated_object(None) {
            self.updates.lock().push(UpdateCall {
                name: name.to_string(),
                object,
                force_allow_create,
            });
        }
        self.enter("update")?;
        self.inner
            .update(
                ctx,
                name,
                info,
                create_validation,
                update_validation,
                force_allow_create,
                options,
            )
            .await
    }

    async fn convert_to_table(
        &self,
        ctx: &Context,
        objects: &[Object],
        options: &TableOptions,
    ) -> StoreResult<Table> {
        self.inner.convert_to_table(ctx, objects, options).await
    }

    fn destroy(&self) {
        self.inner.destroy();
    }

    fn new_object(&self) -> Object {
        self.inner.new_object()
    }

    fn new_list(&self) -> ObjectList {
        self.inner.new_list()
    }

    fn namespace_scoped(&self) -> bool {
        self.inner.namespace_scoped()
    }

    fn singular_name(&self) -> String {
        self.inner.singular_name()
    }
}
