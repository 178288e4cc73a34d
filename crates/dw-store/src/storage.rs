//! The object store contract
//!
//! Provides the [`Storage`] trait implemented by both the legacy and the
//! target backend, and by the dual writer that sits in front of them.

use crate::context::Context;
use crate::error::StoreResult;
use crate::object::{Object, ObjectList};
use crate::options::{CreateOptions, DeleteOptions, GetOptions, ListOptions, UpdateOptions};
use crate::table::{Table, TableOptions};
use async_trait::async_trait;

/// Pre-write hook for creates and deletes; an `Err` rejects the object
pub type ValidateObjectFn = dyn Fn(&Object) -> StoreResult<()> + Send + Sync;

/// Pre-write hook for updates, called with `(new, old)`
pub type ValidateObjectUpdateFn = dyn Fn(&Object, &Object) -> StoreResult<()> + Send + Sync;

/// Run an optional validation hook
///
/// # Errors
/// Whatever the hook returns
#[inline]
pub fn run_validation(validate: Option<&ValidateObjectFn>, obj: &Object) -> StoreResult<()> {
    validate.map_or(Ok(()), |f| f(obj))
}

/// Run an optional update validation hook
///
/// # Errors
/// Whatever the hook returns
#[inline]
pub fn run_update_validation(
    validate: Option<&ValidateObjectUpdateFn>,
    new: &Object,
    old: &Object,
) -> StoreResult<()> {
    validate.map_or(Ok(()), |f| f(new, old))
}

/// Computes the object an update should persist
///
/// `current` is `None` when the object does not exist yet and the update is
/// allowed to create it.
pub trait UpdatedObjectInfo: Send + Sync {
    /// Produce the new object from the stored one
    ///
    /// # Errors
    /// Implementation-defined; returned to the caller unchanged
    fn updated_object(&self, current: Option<&Object>) -> StoreResult<Object>;
}

impl<F> UpdatedObjectInfo for F
where
    F: Fn(Option<&Object>) -> StoreResult<Object> + Send + Sync,
{
    fn updated_object(&self, current: Option<&Object>) -> StoreResult<Object> {
        self(current)
    }
}

/// Update that ignores the stored object and writes a fixed one
#[derive(Debug, Clone)]
pub struct ReplaceObject(pub Object);

impl UpdatedObjectInfo for ReplaceObject {
    fn updated_object(&self, _current: Option<&Object>) -> StoreResult<Object> {
        Ok(self.0.clone())
    }
}

/// Object store backend
///
/// # Contract
/// - `get`, `delete` and `update` without `force_allow_create` fail with
///   `StoreError::NotFound` when the object is absent
/// - validation hooks run before anything is persisted
/// - implementations provide their own concurrency safety for writers
///   to the same object
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Persist a new object, returning it as stored
    async fn create(
        &self,
        ctx: &Context,
        obj: Object,
        create_validation: Option<&ValidateObjectFn>,
        options: &CreateOptions,
    ) -> StoreResult<Object>;

    /// Fetch an object by name
    async fn get(&self, ctx: &Context, name: &str, options: &GetOptions) -> StoreResult<Object>;

    /// List objects
    async fn list(&self, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList>;

    /// Delete an object by name
    ///
    /// Returns the deleted object and whether deletion completes asynchronously.
    async fn delete(
        &self,
        ctx: &Context,
        name: &str,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> StoreResult<(Object, bool)>;

    /// Delete every object matched by `list_options`, returning the deleted objects
    async fn delete_collection(
        &self,
        ctx: &Context,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> StoreResult<ObjectList>;

    /// Update an object, returning it and whether it was created
    #[allow(clippy::too_many_arguments)]
    async fn update(
        &self,
        ctx: &Context,
        name: &str,
        info: &dyn UpdatedObjectInfo,
        create_validation: Option<&ValidateObjectFn>,
        update_validation: Option<&ValidateObjectUpdateFn>,
        force_allow_create: bool,
        options: &UpdateOptions,
    ) -> StoreResult<(Object, bool)>;

    /// Render objects as a table
    async fn convert_to_table(
        &self,
        ctx: &Context,
        objects: &[Object],
        options: &TableOptions,
    ) -> StoreResult<Table>;

    /// Release backend resources
    fn destroy(&self);

    /// Empty object of this resource's kind
    fn new_object(&self) -> Object;

    /// Empty list of this resource's kind
    fn new_list(&self) -> ObjectList;

    /// Whether objects live in namespaces
    fn namespace_scoped(&self) -> bool;

    /// Singular resource name, e.g. `playlist`
    fn singular_name(&self) -> String;
}
