//! Migration configuration
//!
//! One mode per resource, loaded from TOML:
//!
//! ```toml
//! default_mode = "1"
//! parallel_reads = false
//!
//! [resources]
//! playlists = "2"
//!
//! [comparator]
//! ignored_annotation_prefixes = ["dualwrite.io/updated-"]
//! ```

use crate::comparator::ComparatorConfig;
use crate::dual_writer::{DualWriter, DualWriterOptions};
use crate::error::ConfigError;
use crate::mode::DualWriterMode;
use crate::recorder::OutcomeRecorder;
use dw_store::Storage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Dual writer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualWriterConfig {
    /// Mode for resources without an explicit entry
    pub default_mode: DualWriterMode,

    /// Issue mode 2 reads to both backends concurrently
    pub parallel_reads: bool,

    /// Per-resource modes
    pub resources: BTreeMap<String, DualWriterMode>,

    /// Comparator ignore lists
    pub comparator: ComparatorConfig,
}

impl DualWriterConfig {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML or an unknown mode
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML configuration file
    ///
    /// # Errors
    /// `ConfigError::Io` when the file cannot be read, otherwise as
    /// [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Set the mode of one resource
    #[must_use]
    pub fn with_resource_mode(mut self, resource: impl Into<String>, mode: DualWriterMode) -> Self {
        self.resources.insert(resource.into(), mode);
        self
    }

    /// Mode configured for `resource`
    #[must_use]
    pub fn mode_for(&self, resource: &str) -> DualWriterMode {
        self.resources
            .get(resource)
            .copied()
            .unwrap_or(self.default_mode)
    }

    /// Options passed to every writer built from this configuration
    #[must_use]
    pub fn options(&self) -> DualWriterOptions {
        DualWriterOptions::default()
            .with_parallel_reads(self.parallel_reads)
            .with_comparator(self.comparator.clone())
    }

    /// Build the writer for `resource` in its configured mode
    #[must_use]
    pub fn build_writer(
        &self,
        resource: &str,
        legacy: Arc<dyn Storage>,
        storage: Arc<dyn Storage>,
        recorder: Arc<dyn OutcomeRecorder>,
    ) -> DualWriter {
        let mode = self.mode_for(resource);
        tracing::info!(resource, %mode, "building dual writer");
        DualWriter::new(mode, legacy, storage, recorder, resource, self.options())
    }
}
