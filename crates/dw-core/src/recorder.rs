//! Outcome recording for dual-writer calls
//!
//! The dual writer reports, per logical operation:
//! - one duration per backend call, tagged with the backend and a failure flag
//! - one outcome per comparison between a legacy and a target result
//!
//! Recorders never fail the operation. Sinks that can fail must log and
//! swallow their own errors.
//!
//! ## Metric Names
//!
//! - `dual_writer_legacy_duration_seconds{is_error, mode, resource, method}`
//! - `dual_writer_storage_duration_seconds{is_error, mode, resource, method}`
//! - `dual_writer_outcome_total{mode, resource, method, outcome}`

use crate::mode::DualWriterMode;
use dashmap::DashMap;
use metrics::{counter, histogram};
use std::time::{Duration, Instant};

const LEGACY_DURATION: &str = "dual_writer_legacy_duration_seconds";
const STORAGE_DURATION: &str = "dual_writer_storage_duration_seconds";
const OUTCOME_TOTAL: &str = "dual_writer_outcome_total";

/// Method labels used for durations and outcomes
pub mod method {
    /// `create`
    pub const CREATE: &str = "create";
    /// `get`
    pub const GET: &str = "get";
    /// `list`
    pub const LIST: &str = "list";
    /// `delete`
    pub const DELETE: &str = "delete";
    /// `delete-collection`
    pub const DELETE_COLLECTION: &str = "delete-collection";
    /// `update`
    pub const UPDATE: &str = "update";
}

/// Which side of the migration a call went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    /// The established store
    Legacy,
    /// The store being migrated to
    Storage,
}

impl Backend {
    /// Label used in logs
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Storage => "storage",
        }
    }
}

/// Telemetry sink for backend latency and comparison agreement
#[cfg_attr(test, mockall::automock)]
pub trait OutcomeRecorder: Send + Sync + std::fmt::Debug {
    /// Record a legacy call's latency
    fn record_legacy_duration(
        &self,
        failed: bool,
        mode: DualWriterMode,
        resource: &str,
        method: &str,
        start: Instant,
    );

    /// Record a target call's latency
    fn record_storage_duration(
        &self,
        failed: bool,
        mode: DualWriterMode,
        resource: &str,
        method: &str,
        start: Instant,
    );

    /// Record whether legacy and target agreed on an object
    fn record_outcome(
        &self,
        mode: DualWriterMode,
        resource: &str,
        name: &str,
        equal: bool,
        method: &str,
    );
}

/// Recorder that emits through the `metrics` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    fn duration(
        metric: &'static str,
        failed: bool,
        mode: DualWriterMode,
        resource: &str,
        method: &str,
        start: Instant,
    ) {
        let is_error = if failed { "true" } else { "false" };
        histogram!(
            metric,
            "is_error" => is_error,
            "mode" => mode.as_str(),
            "resource" => resource.to_string(),
            "method" => method.to_string()
        )
        .record(start.elapsed().as_secs_f64());
    }
}

impl OutcomeRecorder for MetricsRecorder {
    #[inline]
    fn record_legacy_duration(
        &self,
        failed: bool,
        mode: DualWriterMode,
        resource: &str,
        method: &str,
        start: Instant,
    ) {
        Self::duration(LEGACY_DURATION, failed, mode, resource, method, start);
    }

    #[inline]
    fn record_storage_duration(
        &self,
        failed: bool,
        mode: DualWriterMode,
        resource: &str,
        method: &str,
        start: Instant,
    ) {
        Self::duration(STORAGE_DURATION, failed, mode, resource, method, start);
    }

    #[inline]
    fn record_outcome(
        &self,
        mode: DualWriterMode,
        resource: &str,
        _name: &str,
        equal: bool,
        method: &str,
    ) {
        // Object names are left out of the labels to bound cardinality.
        let outcome = if equal { "equal" } else { "mismatch" };
        counter!(
            OUTCOME_TOTAL,
            "mode" => mode.as_str(),
            "resource" => resource.to_string(),
            "method" => method.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

/// Recorder that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl OutcomeRecorder for NoopRecorder {
    fn record_legacy_duration(&self, _: bool, _: DualWriterMode, _: &str, _: &str, _: Instant) {}

    fn record_storage_duration(&self, _: bool, _: DualWriterMode, _: &str, _: &str, _: Instant) {}

    fn record_outcome(&self, _: DualWriterMode, _: &str, _: &str, _: bool, _: &str) {}
}

/// Comparison tally for one `(mode, method)` pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    /// Comparisons that agreed
    pub equal: u64,
    /// Comparisons that disagreed
    pub mismatch: u64,
}

impl OutcomeTally {
    /// Total comparisons
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.equal + self.mismatch
    }

    /// Fraction of comparisons that agreed, `None` when nothing was compared
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn agreement(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.equal as f64 / total as f64)
    }
}

/// Latency tally for one `(backend, method)` pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationTally {
    /// Calls recorded
    pub calls: u64,
    /// Calls flagged as failed
    pub failures: u64,
    /// Sum of call latencies
    pub total: Duration,
}

/// In-process recorder keeping running tallies
///
/// Useful for operators deciding whether to advance a resource's mode, and
/// for the simulator's report.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    outcomes: DashMap<(DualWriterMode, String), OutcomeTally>,
    durations: DashMap<(Backend, String), DurationTally>,
}

impl StatsRecorder {
    /// Create empty recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Comparison tally for a mode and method
    #[must_use]
    pub fn outcome(&self, mode: DualWriterMode, method: &str) -> OutcomeTally {
        self.outcomes
            .get(&(mode, method.to_string()))
            .map(|entry| *entry)
            .unwrap_or_default()
    }

    /// Latency tally for a backend and method
    #[must_use]
    pub fn duration(&self, backend: Backend, method: &str) -> DurationTally {
        self.durations
            .get(&(backend, method.to_string()))
            .map(|entry| *entry)
            .unwrap_or_default()
    }

    /// All comparison tallies, sorted by mode then method
    #[must_use]
    pub fn outcomes(&self) -> Vec<(DualWriterMode, String, OutcomeTally)> {
        let mut all: Vec<_> = self
            .outcomes
            .iter()
            .map(|entry| (entry.key().0, entry.key().1.clone(), *entry.value()))
            .collect();
        all.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        all
    }

    /// All latency tallies, sorted by backend then method
    #[must_use]
    pub fn durations(&self) -> Vec<(Backend, String, DurationTally)> {
        let mut all: Vec<_> = self
            .durations
            .iter()
            .map(|entry| (entry.key().0, entry.key().1.clone(), *entry.value()))
            .collect();
        all.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        all
    }

    /// Forget everything recorded so far
    pub fn reset(&self) {
        self.outcomes.clear();
        self.durations.clear();
    }

    fn add_duration(&self, backend: Backend, failed: bool, method: &str, start: Instant) {
        let mut tally = self
            .durations
            .entry((backend, method.to_string()))
            .or_default();
        tally.calls += 1;
        if failed {
            tally.failures += 1;
        }
        tally.total += start.elapsed();
    }
}

impl OutcomeRecorder for StatsRecorder {
    fn record_legacy_duration(
        &self,
        failed: bool,
        _mode: DualWriterMode,
        _resource: &str,
        method: &str,
        start: Instant,
    ) {
        self.add_duration(Backend::Legacy, failed, method, start);
    }

    fn record_storage_duration(
        &self,
        failed: bool,
        _mode: DualWriterMode,
        _resource: &str,
        method: &str,
        start: Instant,
    ) {
        self.add_duration(Backend::Storage, failed, method, start);
    }

    fn record_outcome(
        &self,
        mode: DualWriterMode,
        _resource: &str,
        _name: &str,
        equal: bool,
        method: &str,
    ) {
        let mut tally = self.outcomes.entry((mode, method.to_string())).or_default();
        if equal {
            tally.equal += 1;
        } else {
            tally.mismatch += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_tally_outcomes() {
        let stats = StatsRecorder::new();
        stats.record_outcome(DualWriterMode::Mode2, "playlists", "a", true, method::GET);
        stats.record_outcome(DualWriterMode::Mode2, "playlists", "b", false, method::GET);
        stats.record_outcome(DualWriterMode::Mode2, "playlists", "c", true, method::LIST);

        let get = stats.outcome(DualWriterMode::Mode2, method::GET);
        assert_eq!(get, OutcomeTally { equal: 1, mismatch: 1 });
        assert_eq!(get.agreement(), Some(0.5));
        assert_eq!(stats.outcomes().len(), 2);
    }

    #[test]
    fn stats_tally_durations() {
        let stats = StatsRecorder::new();
        let start = Instant::now();
        stats.record_legacy_duration(false, DualWriterMode::Mode1, "playlists", method::CREATE, start);
        stats.record_legacy_duration(true, DualWriterMode::Mode1, "playlists", method::CREATE, start);
        stats.record_storage_duration(false, DualWriterMode::Mode1, "playlists", method::CREATE, start);

        let legacy = stats.duration(Backend::Legacy, method::CREATE);
        assert_eq!(legacy.calls, 2);
        assert_eq!(legacy.failures, 1);
        assert_eq!(stats.duration(Backend::Storage, method::CREATE).calls, 1);
        assert_eq!(stats.duration(Backend::Storage, method::GET).calls, 0);
    }

    #[test]
    fn empty_tally_has_no_agreement() {
        assert_eq!(OutcomeTally::default().agreement(), None);
    }

    #[test]
    fn reset_clears() {
        let stats = StatsRecorder::new();
        stats.record_outcome(DualWriterMode::Mode3, "playlists", "a", true, method::UPDATE);
        stats.reset();
        assert!(stats.outcomes().is_empty());
    }

    #[test]
    fn metrics_recorder_without_exporter_is_silent() {
        let recorder = MetricsRecorder;
        recorder.record_storage_duration(true, DualWriterMode::Mode2, "playlists", method::GET, Instant::now());
        recorder.record_outcome(DualWriterMode::Mode2, "playlists", "a", false, method::GET);
    }
}
