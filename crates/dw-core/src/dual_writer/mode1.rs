//! Mode 1: legacy authoritative, target shadowed
//!
//! Reads never leave legacy. Writes are mirrored to target once legacy has
//! accepted them; a target failure is logged and recorded but the caller
//! only ever sees legacy's answer.

use super::{Backends, ModeWriter};
use crate::enrich::{clear_identity, enrich_created, enrich_object};
use crate::recorder::{method, Backend};
use async_trait::async_trait;
use dw_store::{
    Context, CreateOptions, DeleteOptions, GetOptions, ListOptions, Object, ObjectList,
    ReplaceObject, Storage, StoreResult, Table, TableOptions, UpdateOptions, UpdatedObjectInfo,
    ValidateObjectFn, ValidateObjectUpdateFn,
};
use tracing::warn;

/// Mode 1 writer
#[derive(Debug)]
pub struct DualWriterMode1 {
    core: Backends,
}

impl DualWriterMode1 {
    pub(super) fn new(core: Backends) -> Self {
        Self { core }
    }
}

impl ModeWriter for DualWriterMode1 {
    fn core(&self) -> &Backends {
        &self.core
    }
}

#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::CREATE, name = %obj.name())
)]
async fn create(
    core: &Backends,
    ctx: &Context,
    obj: Object,
    create_validation: Option<&ValidateObjectFn>,
    options: &CreateOptions,
) -> StoreResult<Object> {
    let original = obj.clone();
    let created = core
        .timed(
            Backend::Legacy,
            method::CREATE,
            core.legacy.create(ctx, obj, create_validation, options),
        )
        .await?;

    let shadow = core
        .timed(
            Backend::Storage,
            method::CREATE,
            core.storage
                .create(ctx, enrich_created(original, &created), create_validation, options),
        )
        .await;
    match shadow {
        Ok(stored) => {
            core.compare_and_record(method::CREATE, created.name(), Some(&stored), Some(&created));
        }
        Err(err) => warn!(error = %err, "shadow create failed"),
    }
    Ok(created)
}

#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::DELETE, name = %name)
)]
async fn delete(
    core: &Backends,
    ctx: &Context,
    name: &str,
    delete_validation: Option<&ValidateObjectFn>,
    options: &DeleteOptions,
) -> StoreResult<(Object, bool)> {
    let (deleted, is_async) = core
        .timed(
            Backend::Legacy,
            method::DELETE,
            core.legacy.delete(ctx, name, delete_validation, options),
        )
        .await?;

    // Legacy's preconditions do not apply to target's copy.
    let shadow = core
        .timed_with(
            Backend::Storage,
            method::DELETE,
            core.storage
                .delete(ctx, name, delete_validation, &DeleteOptions::default()),
            |err| !err.is_not_found(),
        )
        .await;
    match shadow {
        Ok((removed, _)) => {
            core.compare_and_record(method::DELETE, name, Some(&removed), Some(&deleted));
        }
        Err(err) if err.is_not_found() => {}
        Err(err) => warn!(error = %err, "shadow delete failed"),
    }
    Ok((deleted, is_async))
}

#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::DELETE_COLLECTION)
)]
async fn delete_collection(
    core: &Backends,
    ctx: &Context,
    delete_validation: Option<&ValidateObjectFn>,
    options: &DeleteOptions,
    list_options: &ListOptions,
) -> StoreResult<ObjectList> {
    let deleted = core
        .timed(
            Backend::Legacy,
            method::DELETE_COLLECTION,
            core.legacy
                .delete_collection(ctx, delete_validation, options, list_options),
        )
        .await?;

    let shadow = core
        .timed(
            Backend::Storage,
            method::DELETE_COLLECTION,
            core.storage
                .delete_collection(ctx, delete_validation, options, list_options),
        )
        .await;
    match shadow {
        Ok(removed) => {
            core.compare_lists_and_record(method::DELETE_COLLECTION, &removed, &deleted);
        }
        Err(err) => warn!(error = %err, "shadow collection delete failed"),
    }
    Ok(deleted)
}

#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::UPDATE, name = %name)
)]
#[allow(clippy::too_many_arguments)]
async fn update(
    core: &Backends,
    ctx: &Context,
    name: &str,
    info: &dyn UpdatedObjectInfo,
    create_validation: Option<&ValidateObjectFn>,
    update_validation: Option<&ValidateObjectUpdateFn>,
    force_allow_create: bool,
    options: &UpdateOptions,
) -> StoreResult<(Object, bool)> {
    let (updated, created) = core
        .timed(
            Backend::Legacy,
            method::UPDATE,
            core.legacy.update(
                ctx,
                name,
                info,
                create_validation,
                update_validation,
                force_allow_create,
                options,
            ),
        )
        .await?;

    let existing = core
        .timed_with(
            Backend::Storage,
            method::UPDATE,
            core.storage.get(ctx, name, &GetOptions::default()),
            |err| !err.is_not_found(),
        )
        .await;
    let mut outgoing = updated.clone();
    let force_target_create = match existing {
        Ok(current) => {
            enrich_object(&current.metadata, &mut outgoing);
            false
        }
        Err(err) if err.is_not_found() => {
            clear_identity(&mut outgoing);
            true
        }
        Err(err) => {
            warn!(error = %err, "skipping shadow update, storage read failed");
            return Ok((updated, created));
        }
    };

    let shadow = core
        .timed(
            Backend::Storage,
            method::UPDATE,
            core.storage.update(
                ctx,
                name,
                &ReplaceObject(outgoing),
                create_validation,
                update_validation,
                force_target_create,
                options,
            ),
        )
        .await;
    match shadow {
        Ok((stored, _)) => {
            core.compare_and_record(method::UPDATE, name, Some(&stored), Some(&updated));
        }
        Err(err) => warn!(error = %err, "shadow update failed"),
    }
    Ok((updated, created))
}

#[async_trait]
impl Storage for DualWriterMode1 {
    async fn create(
        &self,
        ctx: &Context,
        obj: Object,
        create_validation: Option<&ValidateObjectFn>,
        options: &CreateOptions,
    ) -> StoreResult<Object> {
        create(&self.core, ctx, obj, create_validation, options).await
    }

    async fn get(&self, ctx: &Context, name: &str, options: &GetOptions) -> StoreResult<Object> {
        self.core
            .timed(Backend::Legacy, method::GET, self.core.legacy.get(ctx, name, options))
            .await
    }

    async fn list(&self, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList> {
        self.core
            .timed(Backend::Legacy, method::LIST, self.core.legacy.list(ctx, options))
            .await
    }

    async fn delete(
        &self,
        ctx: &Context,
        name: &str,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> StoreResult<(Object, bool)> {
        delete(&self.core, ctx, name, delete_validation, options).await
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> StoreResult<ObjectList> {
        delete_collection(&self.core, ctx, delete_validation, options, list_options).await
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
        update(
            &self.core,
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
        self.core.legacy.convert_to_table(ctx, objects, options).await
    }

    super::delegate_introspection!(legacy);
}
