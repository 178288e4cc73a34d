//! Mode router
//!
//! [`DualWriter`] fronts a legacy and a target [`Storage`] and routes each
//! operation according to a [`DualWriterMode`] fixed at construction. Each
//! mode is its own type, so every policy can be exercised on its own.
//!
//! Writes always reach legacy before target: the target write carries the
//! identity legacy assigned. Backend errors are returned verbatim.

/// Implements the synchronous introspection methods of [`Storage`] by
/// delegating to one backend
macro_rules! delegate_introspection {
    ($backend:ident) => {
        fn destroy(&self) {
            self.core.$backend.destroy();
        }

        fn new_object(&self) -> dw_store::Object {
            self.core.$backend.new_object()
        }

        fn new_list(&self) -> dw_store::ObjectList {
            self.core.$backend.new_list()
        }

        fn namespace_scoped(&self) -> bool {
            self.core.$backend.namespace_scoped()
        }

        fn singular_name(&self) -> String {
            self.core.$backend.singular_name()
        }
    };
}

pub(crate) use delegate_introspection;

mod mode1;
mod mode2;
mod mode3;
mod mode4;

pub use mode1::DualWriterMode1;
pub use mode2::DualWriterMode2;
pub use mode3::DualWriterMode3;
pub use mode4::DualWriterMode4;

use crate::comparator::{Comparator, ComparatorConfig};
use crate::mode::DualWriterMode;
use crate::recorder::{Backend, OutcomeRecorder};
use async_trait::async_trait;
use dw_store::{
    Context, CreateOptions, DeleteOptions, GetOptions, ListOptions, Object, ObjectList, Storage,
    StoreError, StoreResult, Table, TableOptions, UpdateOptions, UpdatedObjectInfo,
    ValidateObjectFn, ValidateObjectUpdateFn,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Knobs shared by every mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DualWriterOptions {
    /// Issue the legacy and target reads of mode 2 concurrently
    pub parallel_reads: bool,

    /// Comparator ignore lists
    pub comparator: ComparatorConfig,
}

impl DualWriterOptions {
    /// Enable or disable concurrent read fan-out
    #[must_use]
    pub fn with_parallel_reads(mut self, enabled: bool) -> Self {
        self.parallel_reads = enabled;
        self
    }

    /// Set comparator ignore lists
    #[must_use]
    pub fn with_comparator(mut self, comparator: ComparatorConfig) -> Self {
        self.comparator = comparator;
        self
    }
}

/// Everything a mode needs to serve a call
#[derive(Debug)]
pub(crate) struct Backends {
    pub(crate) legacy: Arc<dyn Storage>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) recorder: Arc<dyn OutcomeRecorder>,
    pub(crate) comparator: Comparator,
    pub(crate) resource: String,
    pub(crate) mode: DualWriterMode,
    pub(crate) parallel_reads: bool,
}

impl Backends {
    fn new(
        mode: DualWriterMode,
        legacy: Arc<dyn Storage>,
        storage: Arc<dyn Storage>,
        recorder: Arc<dyn OutcomeRecorder>,
        resource: String,
        options: DualWriterOptions,
    ) -> Self {
        Self {
            legacy,
            storage,
            recorder,
            comparator: Comparator::new(options.comparator),
            resource,
            mode,
            parallel_reads: options.parallel_reads,
        }
    }

    fn record_duration(&self, backend: Backend, failed: bool, method: &str, start: Instant) {
        match backend {
            Backend::Legacy => {
                self.recorder
                    .record_legacy_duration(failed, self.mode, &self.resource, method, start);
            }
            Backend::Storage => {
                self.recorder
                    .record_storage_duration(failed, self.mode, &self.resource, method, start);
            }
        }
    }

    /// Await a backend call and record its duration; any error counts as failed
    pub(crate) async fn timed<T, F>(&self, backend: Backend, method: &str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.timed_with(backend, method, call, |_| true).await
    }

    /// Like [`Self::timed`], but only errors matching `is_failure` count as failed
    pub(crate) async fn timed_with<T, F, P>(
        &self,
        backend: Backend,
        method: &str,
        call: F,
        is_failure: P,
    ) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
        P: Fn(&StoreError) -> bool,
    {
        let start = Instant::now();
        let result = call.await;
        let failed = match &result {
            Ok(_) => false,
            Err(err) => {
                let failed = is_failure(err);
                if failed && !err.is_not_found() {
                    error!(backend = backend.as_str(), method, error = %err, "backend call failed");
                } else {
                    debug!(backend = backend.as_str(), method, error = %err, "backend call returned error");
                }
                failed
            }
        };
        self.record_duration(backend, failed, method, start);
        result
    }

    /// Compare a target and a legacy result and record the outcome
    pub(crate) fn compare_and_record(
        &self,
        method: &str,
        name: &str,
        target: Option<&Object>,
        legacy: Option<&Object>,
    ) -> bool {
        let equal = self.comparator.compare(target, legacy);
        self.recorder
            .record_outcome(self.mode, &self.resource, name, equal, method);
        if !equal {
            info!(method, name, "object from legacy and storage are not equal");
            debug!(fields = ?self.comparator.diff(target, legacy), "differing fields");
        }
        equal
    }

    /// Compare two lists and record one outcome under the resource name
    pub(crate) fn compare_lists_and_record(
        &self,
        method: &str,
        target: &ObjectList,
        legacy: &ObjectList,
    ) -> bool {
        let equal = self.comparator.compare_lists(target, legacy);
        self.recorder
            .record_outcome(self.mode, &self.resource, &self.resource, equal, method);
        if !equal {
            info!(
                method,
                legacy = legacy.len(),
                storage = target.len(),
                "lists from legacy and storage are not equal"
            );
        }
        equal
    }
}

/// Storage front routing between legacy and target per migration mode
///
/// Built once per resource; the mode never changes for the life of the value.
#[derive(Debug)]
pub enum DualWriter {
    /// Legacy authoritative, best-effort shadow writes
    Mode1(DualWriterMode1),
    /// Writes to both, reads from target with legacy fallback
    Mode2(DualWriterMode2),
    /// Writes to both, reads from target only
    Mode3(DualWriterMode3),
    /// Target only
    Mode4(DualWriterMode4),
}

impl DualWriter {
    /// Build the writer for `mode`
    #[must_use]
    pub fn new(
        mode: DualWriterMode,
        legacy: Arc<dyn Storage>,
        storage: Arc<dyn Storage>,
        recorder: Arc<dyn OutcomeRecorder>,
        resource: impl Into<String>,
        options: DualWriterOptions,
    ) -> Self {
        let core = Backends::new(mode, legacy, storage, recorder, resource.into(), options);
        match mode {
            DualWriterMode::Mode1 => Self::Mode1(DualWriterMode1::new(core)),
            DualWriterMode::Mode2 => Self::Mode2(DualWriterMode2::new(core)),
            DualWriterMode::Mode3 => Self::Mode3(DualWriterMode3::new(core)),
            DualWriterMode::Mode4 => Self::Mode4(DualWriterMode4::new(core)),
        }
    }

    /// Mode this writer was built for
    #[must_use]
    pub fn mode(&self) -> DualWriterMode {
        match self {
            Self::Mode1(_) => DualWriterMode::Mode1,
            Self::Mode2(_) => DualWriterMode::Mode2,
            Self::Mode3(_) => DualWriterMode::Mode3,
            Self::Mode4(_) => DualWriterMode::Mode4,
        }
    }

    /// Resource this writer serves
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.inner().core().resource
    }

    fn inner(&self) -> &dyn ModeWriter {
        match self {
            Self::Mode1(w) => w,
            Self::Mode2(w) => w,
            Self::Mode3(w) => w,
            Self::Mode4(w) => w,
        }
    }
}

/// Access to the shared backends of a mode type
pub(crate) trait ModeWriter: Storage {
    fn core(&self) -> &Backends;
}

#[async_trait]
impl Storage for DualWriter {
    async fn create(
        &self,
        ctx: &Context,
        obj: Object,
        create_validation: Option<&ValidateObjectFn>,
        options: &CreateOptions,
    ) -> StoreResult<Object> {
        self.inner()
            .create(ctx, obj, create_validation, options)
            .await
    }

    async fn get(&self, ctx: &Context, name: &str, options: &GetOptions) -> StoreResult<Object> {
        self.inner().get(ctx, name, options).await
    }

    async fn list(&self, ctx: &Context, options: &ListOptions) -> StoreResult<ObjectList> {
        self.inner().list(ctx, options).await
    }

    async fn delete(
        &self,
        ctx: &Context,
        name: &str,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> StoreResult<(Object, bool)> {
        self.inner()
            .delete(ctx, name, delete_validation, options)
            .await
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        delete_validation: Option<&ValidateObjectFn>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> StoreResult<ObjectList> {
        self.inner()
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
        self.inner()
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
        self.inner().convert_to_table(ctx, objects, options).await
    }

    fn destroy(&self) {
        self.inner().destroy();
    }

    fn new_object(&self) -> Object {
        self.inner().new_object()
    }

    fn new_list(&self) -> ObjectList {
        self.inner().new_list()
    }

    fn namespace_scoped(&self) -> bool {
        self.inner().namespace_scoped()
    }

    fn singular_name(&self) -> String {
        self.inner().singular_name()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{MockOutcomeRecorder, NoopRecorder};
    use dw_store::MemoryStorage;
    use mockall::predicate::{always, eq};

    fn stores() -> (Arc<dyn Storage>, Arc<dyn Storage>) {
        (
            Arc::new(MemoryStorage::new("Playlist", "playlist")),
            Arc::new(MemoryStorage::new("Playlist", "playlist-target")),
        )
    }

    #[test]
    fn new_selects_variant() {
        for mode in DualWriterMode::ALL {
            let (legacy, storage) = stores();
            let writer = DualWriter::new(
                mode,
                legacy,
                storage,
                Arc::new(NoopRecorder),
                "playlists",
                DualWriterOptions::default(),
            );
            assert_eq!(writer.mode(), mode);
            assert_eq!(writer.resource(), "playlists");
        }
    }

    #[test]
    fn introspection_follows_authoritative_backend() {
        let (legacy, storage) = stores();
        let mode1 = DualWriter::new(
            DualWriterMode::Mode1,
            legacy.clone(),
            storage.clone(),
            Arc::new(NoopRecorder),
            "playlists",
            DualWriterOptions::default(),
        );
        assert_eq!(mode1.singular_name(), "playlist");

        let mode2 = DualWriter::new(
            DualWriterMode::Mode2,
            legacy,
            storage,
            Arc::new(NoopRecorder),
            "playlists",
            DualWriterOptions::default(),
        );
        assert_eq!(mode2.singular_name(), "playlist-target");
    }

    #[tokio::test]
    async fn create_records_one_outcome_and_both_durations() {
        let mut recorder = MockOutcomeRecorder::new();
        recorder
            .expect_record_legacy_duration()
            .with(eq(false), eq(DualWriterMode::Mode2), eq("playlists"), eq("create"), always())
            .times(1)
            .return_const(());
        recorder
            .expect_record_storage_duration()
            .with(eq(false), eq(DualWriterMode::Mode2), eq("playlists"), eq("create"), always())
            .times(1)
            .return_const(());
        recorder
            .expect_record_outcome()
            .with(eq(DualWriterMode::Mode2), eq("playlists"), eq("a"), eq(true), eq("create"))
            .times(1)
            .return_const(());

        let (legacy, storage) = stores();
        let writer = DualWriter::new(
            DualWriterMode::Mode2,
            legacy,
            storage,
            Arc::new(recorder),
            "playlists",
            DualWriterOptions::default(),
        );
        writer
            .create(&Context::new(), Object::new("Playlist", "a"), None, &CreateOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mode4_never_records_legacy() {
        let mut recorder = MockOutcomeRecorder::new();
        recorder.expect_record_legacy_duration().never();
        recorder.expect_record_outcome().never();
        recorder
            .expect_record_storage_duration()
            .times(2)
            .return_const(());

        let (legacy, storage) = stores();
        let writer = DualWriter::new(
            DualWriterMode::Mode4,
            legacy.clone(),
            storage,
            Arc::new(recorder),
            "playlists",
            DualWriterOptions::default(),
        );
        let ctx = Context::new();
        writer
            .create(&ctx, Object::new("Playlist", "a"), None, &CreateOptions::default())
            .await
            .unwrap();
        writer.get(&ctx, "a", &GetOptions::default()).await.unwrap();

        assert!(legacy
            .get(&ctx, "a", &GetOptions::default())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn options_builder() {
        let options = DualWriterOptions::default()
            .with_parallel_reads(true)
            .with_comparator(ComparatorConfig {
                ignored_annotation_prefixes: vec!["x/".into()],
                ignored_label_keys: Vec::new(),
            });
        assert!(options.parallel_reads);
        assert_eq!(options.comparator.ignored_annotation_prefixes, vec!["x/".to_string()]);
    }
}
