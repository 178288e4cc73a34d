//! Error types shared by every object store backend
//!
//! Both the legacy and the target backend report failures through
//! [`StoreError`], so callers can run the same kind checks (for example
//! [`StoreError::is_not_found`]) whichever backend produced the error.

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Object store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("{kind} \"{name}\" not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
    },

    /// Object with the same identity already exists
    #[error("{kind} \"{name}\" already exists")]
    AlreadyExists {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
    },

    /// Optimistic concurrency or precondition failure
    #[error("operation cannot be fulfilled on {kind} \"{name}\": {reason}")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
        /// Why the write was refused
        reason: String,
    },

    /// Rejected by a validation callback
    #[error("{kind} \"{name}\" is invalid: {reason}")]
    Invalid {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
        /// Validation message
        reason: String,
    },

    /// Backend cannot serve requests
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Request deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create not found error
    #[inline]
    #[must_use]
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create already exists error
    #[inline]
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create conflict error
    #[inline]
    #[must_use]
    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create validation error
    #[inline]
    #[must_use]
    pub fn invalid(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Check for [`StoreError::NotFound`]
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check for [`StoreError::AlreadyExists`]
    #[inline]
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check for [`StoreError::Conflict`]
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check for [`StoreError::Invalid`]
    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// Check whether the caller gave up on the request
    #[inline]
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_predicate() {
        let err = StoreError::not_found("Playlist", "a");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "Playlist \"a\" not found");
    }

    #[test]
    fn conflict_message() {
        let err = StoreError::conflict("Playlist", "a", "resource version mismatch");
        assert!(err.is_conflict());
        assert!(err.to_string().contains("resource version mismatch"));
    }

    #[test]
    fn cancellation_kinds() {
        assert!(StoreError::Cancelled.is_cancellation());
        assert!(StoreError::DeadlineExceeded.is_cancellation());
        assert!(!StoreError::Unavailable("down".into()).is_cancellation());
    }
}
