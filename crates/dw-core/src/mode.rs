//! Migration modes
//!
//! A mode states how far the target store is trusted over the legacy store.
//! Modes are totally ordered; advancing the mode moves traffic toward target.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Migration mode of a single resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum DualWriterMode {
    /// Legacy serves everything; target receives best-effort shadow writes
    #[default]
    Mode1,

    /// Writes to both; reads from target with legacy fallback
    Mode2,

    /// Writes to both; reads from target only
    Mode3,

    /// Target only
    Mode4,
}

impl DualWriterMode {
    /// All modes in ascending order
    pub const ALL: [Self; 4] = [Self::Mode1, Self::Mode2, Self::Mode3, Self::Mode4];

    /// Label used in logs and metrics
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mode1 => "1",
            Self::Mode2 => "2",
            Self::Mode3 => "3",
            Self::Mode4 => "4",
        }
    }

    /// Whether legacy takes part in this mode at all
    #[inline]
    #[must_use]
    pub fn uses_legacy(self) -> bool {
        self < Self::Mode4
    }

    /// Whether reads are answered from target
    #[inline]
    #[must_use]
    pub fn reads_from_target(self) -> bool {
        self >= Self::Mode2
    }

    /// Whether a failed target write fails the operation
    #[inline]
    #[must_use]
    pub fn target_write_required(self) -> bool {
        self >= Self::Mode2
    }
}

impl fmt::Display for DualWriterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DualWriterMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("mode")
            .or_else(|| trimmed.strip_prefix("Mode"))
            .unwrap_or(trimmed);
        match digits {
            "1" => Ok(Self::Mode1),
            "2" => Ok(Self::Mode2),
            "3" => Ok(Self::Mode3),
            "4" => Ok(Self::Mode4),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for DualWriterMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DualWriterMode> for String {
    fn from(mode: DualWriterMode) -> Self {
        mode.as_str().to_string()
    }
}
