//! Mode 2: write to both, read from target with legacy fallback
//!
//! Legacy decides whether a write is accepted; target's result is what the
//! caller gets back. A legacy failure stops the operation before target is
//! touched, except that a legacy not-found does not stop a delete.

use super::{Backends, ModeWriter};
use crate::enrich::{clear_identity, enrich_created, enrich_object, index_by_name};
use crate::recorder::{method, Backend};
use async_trait::async_trait;
use dw_store::{
    Context, CreateOptions, DeleteOptions, GetOptions, ListOptions, Object, ObjectList,
    ReplaceObject, Storage, StoreError, StoreResult, Table, TableOptions, UpdateOptions,
    UpdatedObjectInfo, ValidateObjectFn, ValidateObjectUpdateFn,
};
use tracing::debug;

/// Mode 2 writer
#[derive(Debug)]
pub struct DualWriterMode2 {
    core: Backends,
}

impl DualWriterMode2 {
    pub(super) fn new(core: Backends) -> Self {
        Self { core }
    }
}

impl ModeWriter for DualWriterMode2 {
    fn core(&self) -> &Backends {
        &self.core
    }
}

fn tolerate_not_found(err: &StoreError) -> bool {
    !err.is_not_found()
}

/// Delete options for the target leg
///
/// Resource versions are backend-local, so a resource version precondition
/// written against legacy is dropped. The uid precondition is kept since
/// target objects carry legacy's uid.
fn target_delete_options(options: &DeleteOptions) -> DeleteOptions {
    let mut target = options.clone();
    if let Some(preconditions) = target.preconditions.as_mut() {
        preconditions.resource_version = None;
        if preconditions.uid.is_none() {
            target.preconditions = None;
        }
    }
    target
}

/// Legacy create, then target create of the enriched original
#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::CREATE, name = %obj.name())
)]
pub(super) async fn create(
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

    let enriched = enrich_created(original, &created);
    let stored = core
        .timed(
            Backend::Storage,
            method::CREATE,
            core.storage.create(ctx, enriched, create_validation, options),
        )
        .await?;

    core.compare_and_record(method::CREATE, stored.name(), Some(&stored), Some(&created));
    Ok(stored)
}

#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::GET, name = %name)
)]
async fn get(
    core: &Backends,
    ctx: &Context,
    name: &str,
    options: &GetOptions,
) -> StoreResult<Object> {
    if core.parallel_reads {
        let (target, legacy) = futures::join!(
            core.timed(Backend::Storage, method::GET, core.storage.get(ctx, name, options)),
            core.timed(Backend::Legacy, method::GET, core.legacy.get(ctx, name, options)),
        );
        return settle_get(core, name, target, legacy);
    }

    let target = core
        .timed(Backend::Storage, method::GET, core.storage.get(ctx, name, options))
        .await;
    if target.as_ref().is_err_and(|err| !err.is_not_found()) {
        return target;
    }
    let legacy = core
        .timed(Backend::Legacy, method::GET, core.legacy.get(ctx, name, options))
        .await;
    settle_get(core, name, target, legacy)
}

/// Pick the answer of a get from both backend results
fn settle_get(
    core: &Backends,
    name: &str,
    target: StoreResult<Object>,
    legacy: StoreResult<Object>,
) -> StoreResult<Object> {
    match target {
        Ok(found) => {
            let old = legacy?;
            core.compare_and_record(method::GET, name, Some(&found), Some(&old));
            Ok(found)
        }
        Err(err) if err.is_not_found() => {
            let old = legacy?;
            debug!("object missing from storage, serving legacy object");
            core.compare_and_record(method::GET, name, None, Some(&old));
            Ok(old)
        }
        Err(err) => Err(err),
    }
}

#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::LIST)
)]
async fn list(core: &Backends, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList> {
    let (legacy, target) = if core.parallel_reads {
        let (legacy, target) = futures::join!(
            core.timed(Backend::Legacy, method::LIST, core.legacy.list(ctx, options)),
            core.timed(Backend::Storage, method::LIST, core.storage.list(ctx, options)),
        );
        (legacy?, target?)
    } else {
        let legacy = core
            .timed(Backend::Legacy, method::LIST, core.legacy.list(ctx, options))
            .await?;
        let target = core
            .timed(Backend::Storage, method::LIST, core.storage.list(ctx, options))
            .await?;
        (legacy, target)
    };
    Ok(merge_list(core, legacy, target))
}

/// Substitute target objects into legacy's list by name
///
/// Legacy keeps the shape and order of the answer. Target objects unknown to
/// legacy are dropped.
fn merge_list(core: &Backends, mut legacy: ObjectList, target: ObjectList) -> ObjectList {
    let index = index_by_name(&legacy);
    for obj in target.items {
        let Some(&slot) = index.get(obj.name()) else {
            continue;
        };
        core.compare_and_record(method::LIST, obj.name(), Some(&obj), Some(&legacy.items[slot]));
        legacy.items[slot] = obj;
    }
    legacy
}

/// Legacy delete, then target delete; not-found on either side is tolerated
#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::DELETE, name = %name)
)]
pub(super) async fn delete(
    core: &Backends,
    ctx: &Context,
    name: &str,
    delete_validation: Option<&ValidateObjectFn>,
    options: &DeleteOptions,
) -> StoreResult<(Object, bool)> {
    let legacy = match core
        .timed_with(
            Backend::Legacy,
            method::DELETE,
            core.legacy.delete(ctx, name, delete_validation, options),
            tolerate_not_found,
        )
        .await
    {
        Ok((deleted, _)) => Some(deleted),
        Err(err) if err.is_not_found() => {
            debug!("object missing from legacy, deleting from storage only");
            None
        }
        Err(err) => return Err(err),
    };

    let target = core
        .timed_with(
            Backend::Storage,
            method::DELETE,
            core.storage
                .delete(ctx, name, delete_validation, &target_delete_options(options)),
            tolerate_not_found,
        )
        .await;

    match target {
        Ok((deleted, is_async)) => {
            core.compare_and_record(method::DELETE, name, Some(&deleted), legacy.as_ref());
            Ok((deleted, is_async))
        }
        Err(err) if err.is_not_found() => {
            core.compare_and_record(method::DELETE, name, None, legacy.as_ref());
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Legacy collection delete, then the same delete on target
#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::DELETE_COLLECTION)
)]
pub(super) async fn delete_collection(
    core: &Backends,
    ctx: &Context,
    delete_validation: Option<&ValidateObjectFn>,
    options: &DeleteOptions,
    list_options: &ListOptions,
) -> StoreResult<ObjectList> {
    let legacy = core
        .timed(
            Backend::Legacy,
            method::DELETE_COLLECTION,
            core.legacy
                .delete_collection(ctx, delete_validation, options, list_options),
        )
        .await?;

    let target_options = target_delete_options(options);
    let target = core
        .timed(
            Backend::Storage,
            method::DELETE_COLLECTION,
            core.storage
                .delete_collection(ctx, delete_validation, &target_options, list_options),
        )
        .await?;

    let deleted = index_by_name(&target);
    let missing: Vec<&str> = legacy
        .names()
        .filter(|name| !deleted.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        debug!(?missing, "objects deleted from legacy but not from storage");
    }

    core.compare_lists_and_record(method::DELETE_COLLECTION, &target, &legacy);
    Ok(target)
}

/// Update legacy, then write legacy's result to target
///
/// Target's prior object lends its identity to the target write. Without a
/// prior object the target write becomes a create.
#[tracing::instrument(
    skip_all,
    fields(mode = %core.mode, resource = %core.resource, method = method::UPDATE, name = %name)
)]
#[allow(clippy::too_many_arguments)]
pub(super) async fn update(
    core: &Backends,
    ctx: &Context,
    name: &str,
    info: &dyn UpdatedObjectInfo,
    create_validation: Option<&ValidateObjectFn>,
    update_validation: Option<&ValidateObjectUpdateFn>,
    force_allow_create: bool,
    options: &UpdateOptions,
) -> StoreResult<(Object, bool)> {
    let existing = match core
        .timed_with(
            Backend::Storage,
            method::UPDATE,
            core.storage.get(ctx, name, &GetOptions::default()),
            tolerate_not_found,
        )
        .await
    {
        Ok(found) => Some(found),
        Err(err) if err.is_not_found() => {
            debug!("object missing from storage, update will create it");
            None
        }
        Err(err) => return Err(err),
    };

    let (updated, _) = core
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

    let mut outgoing = updated.clone();
    let force_allow_create = match &existing {
        Some(current) => {
            enrich_object(&current.metadata, &mut outgoing);
            force_allow_create
        }
        None => {
            clear_identity(&mut outgoing);
            true
        }
    };

    let (stored, created) = core
        .timed(
            Backend::Storage,
            method::UPDATE,
            core.storage.update(
                ctx,
                name,
                &ReplaceObject(outgoing),
                create_validation,
                update_validation,
                force_allow_create,
                options,
            ),
        )
        .await?;

    core.compare_and_record(method::UPDATE, name, Some(&stored), Some(&updated));
    Ok((stored, created))
}

#[async_trait]
impl Storage for DualWriterMode2 {
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
        get(&self.core, ctx, name, options).await
    }

    async fn list(&self, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList> {
        list(&self.core, ctx, options).await
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
        self.core.storage.convert_to_table(ctx, objects, options).await
    }

    super::delegate_introspection!(storage);
}
