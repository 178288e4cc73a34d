//! Mode 4: target only
//!
//! Legacy is never touched. Target calls are still timed so latency stays
//! visible after the migration completes.

use super::{Backends, ModeWriter};
use crate::recorder::{method, Backend};
use async_trait::async_trait;
use dw_store::{
    Context, CreateOptions, DeleteOptions, GetOptions, ListOptions, Object, ObjectList, Storage,
    StoreResult, Table, TableOptions, UpdateOptions, UpdatedObjectInfo, ValidateObjectFn,
    ValidateObjectUpdateFn,
};

/// Mode 4 writer
#[derive(Debug)]
pub struct DualWriterMode4 {
    core: Backends,
}

impl DualWriterMode4 {
    pub(super) fn new(core: Backends) -> Self {
        Self { core }
    }
}

impl ModeWriter for DualWriterMode4 {
    fn core(&self) -> &Backends {
        &self.core
    }
}

#[async_trait]
impl Storage for DualWriterMode4 {
    async fn create(
        &self,
        ctx: &Context,
        obj: Object,
        create_validation: Option<&ValidateObjectFn>,
        options: &CreateOptions,
    ) -> StoreResult<Object> {
        let storage = &self.core.storage;
        self.core
            .timed(
                Backend::Storage,
                method::CREATE,
                storage.create(ctx, obj, create_validation, options),
            )
            .await
    }

    async fn get(&self, ctx: &Context, name: &str, options: &GetOptions) -> StoreResult<Object> {
        self.core
            .timed(Backend::Storage, method::GET, self.core.storage.get(ctx, name, options))
            .await
    }

    async fn list(&self, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList> {
        self.core
            .timed(Backend::Storage, method::LIST, self.core.storage.list(ctx, options))
            .await
    }

    async fn delete(
        &self,
        ctx: &Context,
        name: &str,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> StoreResult<(Object, bool)> {
        let storage = &self.core.storage;
        self.core
            .timed(
                Backend::Storage,
                method::DELETE,
                storage.delete(ctx, name, delete_validation, options),
            )
            .await
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> StoreResult<ObjectList> {
        let storage = &self.core.storage;
        self.core
            .timed(
                Backend::Storage,
                method::DELETE_COLLECTION,
                storage.delete_collection(ctx, delete_validation, options, list_options),
            )
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
        let storage = &self.core.storage;
        self.core
            .timed(
                Backend::Storage,
                method::UPDATE,
                storage.update(
                    ctx,
                    name,
                    info,
                    create_validation,
                    update_validation,
                    force_allow_create,
                    options,
                ),
            )
            .await
    }

    async fn convert_to_table(
        &self,
        ctx: &Context,
        objects: &[Object],
        options: &TableOptions,
    ) -> StoreResult<Table> {
        self.core.storage.convert_to_table(ctx, objects, options).await
    }

    super::delegate_introspection!(storage);
}
