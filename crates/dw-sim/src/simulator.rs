//! Synthetic traffic through a dual writer
//!
//! Seeds a legacy store, mirrors it into a target store with a chosen share
//! of diverged payloads, then drives reads and writes through a
//! [`DualWriter`] and reports what the comparator saw.

use dw_core::{method, Backend, DualWriter, DualWriterMode, DualWriterOptions, StatsRecorder};
use dw_store::{
    Context, CreateOptions, DeleteOptions, GetOptions, ListOptions, MemoryStorage, Object,
    Storage, StoreResult, UpdateOptions,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const KIND: &str = "Playlist";
const SINGULAR: &str = "playlist";

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Objects seeded into legacy before traffic starts
    pub objects: usize,
    /// Share of mirrored objects whose target payload differs, in `[0, 1]`
    pub divergence: f64,
    /// Mode under test
    pub mode: DualWriterMode,
    /// Resource label used in telemetry
    pub resource: String,
    /// Writer options
    pub options: DualWriterOptions,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            objects: 100,
            divergence: 0.1,
            mode: DualWriterMode::Mode2,
            resource: "playlists".to_string(),
            options: DualWriterOptions::default(),
        }
    }
}

/// Calls issued through the writer for one method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCount {
    pub attempted: u64,
    pub failed: u64,
}

/// Comparator agreement for one method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodOutcome {
    pub method: String,
    pub equal: u64,
    pub mismatch: u64,
    pub agreement: Option<f64>,
}

/// Backend latency for one method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendLatency {
    pub backend: &'static str,
    pub method: String,
    pub calls: u64,
    pub failures: u64,
    pub mean_ms: f64,
}

/// Simulation results
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    pub seed: u64,
    pub mode: DualWriterMode,
    pub resource: String,
    pub objects: usize,
    pub diverged: usize,
    pub operations: BTreeMap<&'static str, OperationCount>,
    pub outcomes: Vec<MethodOutcome>,
    pub latencies: Vec<BackendLatency>,
}

impl SimulatorReport {
    /// Outcome row for `method`, if anything was compared
    pub fn outcome(&self, method: &str) -> Option<&MethodOutcome> {
        self.outcomes.iter().find(|row| row.method == method)
    }

    /// Mismatches across every method
    pub fn total_mismatches(&self) -> u64 {
        self.outcomes.iter().map(|row| row.mismatch).sum()
    }

    /// Human-readable report
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Dual Writer Simulation Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.seed));
        report.push_str(&format!("Mode: {}\n", self.mode));
        report.push_str(&format!("Resource: {}\n", self.resource));
        report.push_str(&format!(
            "Objects: {} ({} diverged in storage)\n\n",
            self.objects, self.diverged
        ));

        report.push_str("Operations:\n");
        for (method, count) in &self.operations {
            report.push_str(&format!(
                "  {method:<18} attempted {:>6}  failed {:>6}\n",
                count.attempted, count.failed
            ));
        }

        report.push_str("\nComparisons:\n");
        if self.outcomes.is_empty() {
            report.push_str("  none (mode does not compare)\n");
        }
        for row in &self.outcomes {
            let agreement = row
                .agreement
                .map_or_else(|| "-".to_string(), |a| format!("{:.1}%", a * 100.0));
            report.push_str(&format!(
                "  {:<18} equal {:>6}  mismatch {:>6}  agreement {agreement}\n",
                row.method, row.equal, row.mismatch
            ));
        }

        report.push_str("\nLatency:\n");
        for row in &self.latencies {
            report.push_str(&format!(
                "  {:<8} {:<18} calls {:>6}  failures {:>6}  mean {:.3}ms\n",
                row.backend, row.method, row.calls, row.failures, row.mean_ms
            ));
        }

        report
    }
}

#[derive(Debug, Default)]
struct Operations(BTreeMap<&'static str, OperationCount>);

impl Operations {
    fn track<T>(&mut self, method: &'static str, result: StoreResult<T>) {
        let count = self.0.entry(method).or_default();
        count.attempted += 1;
        if let Err(err) = result {
            count.failed += 1;
            debug!(method, error = %err, "simulated call failed");
        }
    }
}

fn sample_object(name: &str, minutes: u32) -> Object {
    Object::new(KIND, name)
        .with_label("simulated", "true")
        .with_annotation("grafana.app/created-by", "dw-sim")
        .with_spec(json!({
            "title": format!("Playlist {name}"),
            "interval": format!("{minutes}m"),
        }))
}

/// Copy legacy's objects into target, diverging a share of the payloads
///
/// Returns how many were diverged.
async fn mirror(
    ctx: &Context,
    legacy: &MemoryStorage,
    target: &MemoryStorage,
    names: &[String],
    divergence: f64,
    rng: &mut StdRng,
) -> usize {
    let mut diverged = 0;
    for name in names {
        let minutes = rng.random_range(1..60);
        let stored = match legacy
            .create(ctx, sample_object(name, minutes), None, &CreateOptions::default())
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                warn!(name, error = %err, "seeding legacy failed");
                continue;
            }
        };

        let mut copy = stored;
        if rng.random_bool(divergence) {
            copy.spec = json!({"title": format!("Playlist {name} (stale)"), "interval": "0m"});
            diverged += 1;
        }
        if let Err(err) = target.create(ctx, copy, None, &CreateOptions::default()).await {
            warn!(name, error = %err, "seeding storage failed");
        }
    }
    diverged
}

/// Run the simulation
pub async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let divergence = if (0.0..=1.0).contains(&config.divergence) {
        config.divergence
    } else {
        0.0
    };

    let legacy = Arc::new(MemoryStorage::new(KIND, SINGULAR));
    let target = Arc::new(MemoryStorage::new(KIND, SINGULAR));
    let ctx = Context::new();

    let names: Vec<String> = (0..config.objects).map(|i| format!("sim-{i:04}")).collect();
    let diverged = mirror(&ctx, &legacy, &target, &names, divergence, &mut rng).await;
    info!(objects = names.len(), diverged, mode = %config.mode, "stores seeded");

    let stats = Arc::new(StatsRecorder::new());
    let writer = DualWriter::new(
        config.mode,
        legacy,
        target,
        stats.clone(),
        config.resource.clone(),
        config.options.clone(),
    );
    let mut ops = Operations::default();

    for name in &names {
        ops.track(method::GET, writer.get(&ctx, name, &GetOptions::default()).await);
    }
    ops.track(method::LIST, writer.list(&ctx, &ListOptions::default()).await);

    for name in &names {
        if !rng.random_bool(0.5) {
            continue;
        }
        let minutes: u32 = rng.random_range(1..60);
        let info = move |current: Option<&Object>| -> StoreResult<Object> {
            let mut obj = current.cloned().unwrap_or_default();
            if let Some(spec) = obj.spec.as_object_mut() {
                spec.insert("interval".to_string(), json!(format!("{minutes}m")));
            }
            Ok(obj)
        };
        let result = writer
            .update(&ctx, name, &info, None, None, false, &UpdateOptions::default())
            .await;
        ops.track(method::UPDATE, result);
    }

    for i in 0..(config.objects / 4).max(1) {
        let minutes = rng.random_range(1..60);
        let obj = sample_object(&format!("new-{i:04}"), minutes);
        let result = writer.create(&ctx, obj, None, &CreateOptions::default()).await;
        ops.track(method::CREATE, result);
    }

    for name in &names {
        if !rng.random_bool(0.25) {
            continue;
        }
        let result = writer.delete(&ctx, name, None, &DeleteOptions::default()).await;
        ops.track(method::DELETE, result);
    }
    ops.track(method::LIST, writer.list(&ctx, &ListOptions::default()).await);

    build_report(&config, diverged, ops, &stats)
}

#[allow(clippy::cast_precision_loss)]
fn build_report(
    config: &SimulatorConfig,
    diverged: usize,
    ops: Operations,
    stats: &StatsRecorder,
) -> SimulatorReport {
    let outcomes = stats
        .outcomes()
        .into_iter()
        .filter(|(mode, _, _)| *mode == config.mode)
        .map(|(_, method, tally)| MethodOutcome {
            method,
            equal: tally.equal,
            mismatch: tally.mismatch,
            agreement: tally.agreement(),
        })
        .collect();

    let latencies = stats
        .durations()
        .into_iter()
        .map(|(backend, method, tally)| BackendLatency {
            backend: backend.as_str(),
            method,
            calls: tally.calls,
            failures: tally.failures,
            mean_ms: if tally.calls == 0 {
                0.0
            } else {
                tally.total.as_secs_f64() * 1000.0 / tally.calls as f64
            },
        })
        .collect();

    SimulatorReport {
        seed: config.seed,
        mode: config.mode,
        resource: config.resource.clone(),
        objects: config.objects,
        diverged,
        operations: ops.0,
        outcomes,
        latencies,
    }
}

/// Backends a mode touches, for the report header
pub fn participating_backends(mode: DualWriterMode) -> Vec<Backend> {
    if mode.uses_legacy() {
        vec![Backend::Legacy, Backend::Storage]
    } else {
        vec![Backend::Storage]
    }
}
