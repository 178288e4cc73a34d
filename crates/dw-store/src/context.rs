//! Per-request execution context
//!
//! Carries the cancellation handle, an optional deadline and the request
//! namespace. The same context is threaded through every backend call of a
//! logical operation so both backends observe a caller's cancellation.

use crate::error::{StoreError, StoreResult};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellable request context
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    namespace: Option<String>,
}

impl Context {
    /// Create a context with no deadline and no namespace
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope requests to a namespace
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Fail requests still running after `timeout`
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Derive a context that is cancelled together with `self`
    /// but can also be cancelled on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            namespace: self.namespace.clone(),
        }
    }

    /// Request namespace
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Deadline, if any
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and its children
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Return an error if the request was cancelled or its deadline passed
    ///
    /// # Errors
    /// - `StoreError::Cancelled` after [`Context::cancel`]
    /// - `StoreError::DeadlineExceeded` once the deadline is reached
    pub fn check(&self) -> StoreResult<()> {
        if self.token.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves when the context is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
