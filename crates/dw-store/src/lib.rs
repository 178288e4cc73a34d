//! Object Store Contract
//!
//! The common interface implemented by every backend taking part in a
//! storage migration, plus an in-memory reference backend.
//!
//! # Core Concepts
//!
//! - [`Object`] / [`ObjectList`]: identifiable resource records
//! - [`Storage`]: async CRUD + list contract shared by legacy and target stores
//! - [`Context`]: cancellation, deadline and namespace for one request
//! - [`StoreError`]: error shape shared by all backends
//! - [`MemoryStorage`]: ordered-map backend used in tests and simulations
//!
//! # Example
//!
//! ```rust,ignore
//! use dw_store::{Context, CreateOptions, MemoryStorage, Object, Storage};
//!
//! let store = MemoryStorage::new("Playlist", "playlist");
//! let ctx = Context::new();
//! let created = store
//!     .create(&ctx, Object::new("Playlist", "morning"), None, &CreateOptions::default())
//!     .await?;
//! assert_eq!(created.resource_version(), "1");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod context;
mod error;
mod memory;
mod object;
mod options;
mod storage;
mod table;

pub use context::Context;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStorage;
pub use object::{Object, ObjectList, ObjectMeta, StringMap};
pub use options::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, Preconditions, UpdateOptions,
};
pub use storage::{
    run_update_validation, run_validation, ReplaceObject, Storage, UpdatedObjectInfo,
    ValidateObjectFn, ValidateObjectUpdateFn,
};
pub use table::{Table, TableColumnDefinition, TableOptions, TableRow};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
