//! Dual-Write Migration Core
//!
//! Routes live traffic between a legacy and a target object store while a
//! resource migrates from one to the other.
//!
//! # Core Concepts
//!
//! - [`DualWriterMode`]: how far target is trusted over legacy (1 to 4)
//! - [`DualWriter`]: a [`dw_store::Storage`] front selected once per resource
//! - [`Comparator`]: semantic equality that ignores backend bookkeeping
//! - [`OutcomeRecorder`]: latency and agreement telemetry sink
//! - [`DualWriterConfig`]: per-resource modes loaded from TOML
//!
//! # Example
//!
//! ```rust,ignore
//! use dw_core::{DualWriterConfig, MetricsRecorder};
//! use dw_store::MemoryStorage;
//! use std::sync::Arc;
//!
//! let config = DualWriterConfig::load("dual-writer.toml")?;
//! let writer = config.build_writer(
//!     "playlists",
//!     Arc::new(MemoryStorage::new("Playlist", "playlist")),
//!     Arc::new(MemoryStorage::new("Playlist", "playlist")),
//!     Arc::new(MetricsRecorder),
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod comparator;
pub mod config;
pub mod dual_writer;
pub mod enrich;
pub mod error;
pub mod mode;
pub mod recorder;

pub use comparator::{compare, Comparator, ComparatorConfig};
pub use config::DualWriterConfig;
pub use dual_writer::{
    DualWriter, DualWriterMode1, DualWriterMode2, DualWriterMode3, DualWriterMode4,
    DualWriterOptions,
};
pub use error::ConfigError;
pub use mode::DualWriterMode;
pub use recorder::{
    method, Backend, DurationTally, MetricsRecorder, NoopRecorder, OutcomeRecorder, OutcomeTally,
    StatsRecorder,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
