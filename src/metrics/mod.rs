//! Metrics sink for the verification pipeline.
//!
//! Process-wide shared state: monotonic counters for verification
//! pass/fail/cancellation and verifier disagreement, plus a bucketed
//! duration histogram keyed by pipeline stage. Cheap to clone; all
//! operations are safe for concurrent use from many in-flight decisions.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Pipeline stage a duration observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Schema validation stage.
    Schema,
    /// Verifier-oracle stage.
    Verifier,
    /// Whole pipeline, entry to exit.
    Total,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Schema => write!(f, "schema"),
            PipelineStage::Verifier => write!(f, "verifier"),
            PipelineStage::Total => write!(f, "total"),
        }
    }
}

const LATENCY_BUCKETS_MS: [u64; 9] = [1, 5, 10, 25, 50, 100, 250, 500, 1000];

#[derive(Debug, Default)]
struct HistogramState {
    buckets: BTreeMap<(PipelineStage, u64), u64>,
    counts: BTreeMap<PipelineStage, u64>,
    sums_ms: BTreeMap<PipelineStage, u64>,
}

#[derive(Debug, Default)]
struct SinkState {
    verifications_passed: AtomicU64,
    verifications_failed: AtomicU64,
    verifications_cancelled: AtomicU64,
    verifier_disagreements: AtomicU64,
    histogram: Mutex<HistogramState>,
}

/// Point-in-time view of the sink, for assertions and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Verifications that passed.
    pub passed: u64,
    /// Verifications that failed (schema, score, or pipeline failure).
    pub failed: u64,
    /// Verifications cancelled in flight.
    pub cancelled: u64,
    /// Verifications whose agreement rate fell below the threshold.
    pub disagreements: u64,
}

/// Shared metrics sink.
///
/// Counters are monotonically increasing; there is no teardown beyond
/// process exit.
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    state: Arc<SinkState>,
}

impl MetricsSink {
    /// Create a fresh sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verification pass.
    pub fn record_pass(&self) {
        self.state.verifications_passed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a verification failure.
    pub fn record_failure(&self) {
        self.state.verifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cancelled verification.
    ///
    /// Cancellation is tracked separately so it is never mistaken for a
    /// genuine verification failure.
    pub fn record_cancellation(&self) {
        self.state
            .verifications_cancelled
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a verifier disagreement.
    pub fn record_disagreement(&self) {
        self.state
            .verifier_disagreements
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Observe a stage duration.
    pub fn observe_duration(&self, stage: PipelineStage, duration: Duration) {
        let millis = duration.as_millis().min(u128::from(u64::MAX)) as u64;
        let bucket = LATENCY_BUCKETS_MS
            .into_iter()
            .find(|bound| millis <= *bound)
            .unwrap_or(u64::MAX);

        let mut guard = self.state.histogram.lock();
        let entry = guard.buckets.entry((stage, bucket)).or_insert(0);
        *entry = entry.saturating_add(1);
        let count = guard.counts.entry(stage).or_insert(0);
        *count = count.saturating_add(1);
        let sum = guard.sums_ms.entry(stage).or_insert(0);
        *sum = sum.saturating_add(millis);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passed: self.state.verifications_passed.load(Ordering::Relaxed),
            failed: self.state.verifications_failed.load(Ordering::Relaxed),
            cancelled: self.state.verifications_cancelled.load(Ordering::Relaxed),
            disagreements: self.state.verifier_disagreements.load(Ordering::Relaxed),
        }
    }

    /// Number of duration observations recorded for a stage.
    pub fn observation_count(&self, stage: PipelineStage) -> u64 {
        *self.state.histogram.lock().counts.get(&stage).unwrap_or(&0)
    }

    /// Render the sink in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(out, "# TYPE verifications_passed_total counter");
        let _ = writeln!(out, "verifications_passed_total {}", snapshot.passed);
        let _ = writeln!(out, "# TYPE verifications_failed_total counter");
        let _ = writeln!(out, "verifications_failed_total {}", snapshot.failed);
        let _ = writeln!(out, "# TYPE verifications_cancelled_total counter");
        let _ = writeln!(out, "verifications_cancelled_total {}", snapshot.cancelled);
        let _ = writeln!(out, "# TYPE verifier_disagreements_total counter");
        let _ = writeln!(
            out,
            "verifier_disagreements_total {}",
            snapshot.disagreements
        );

        let guard = self.state.histogram.lock();
        let _ = writeln!(out, "# TYPE verification_duration_ms histogram");
        for ((stage, bound), count) in &guard.buckets {
            let le = if *bound == u64::MAX {
                "+Inf".to_string()
            } else {
                bound.to_string()
            };
            let _ = writeln!(
                out,
                "verification_duration_ms_bucket{{stage=\"{}\",le=\"{}\"}} {}",
                stage, le, count
            );
        }
        for (stage, count) in &guard.counts {
            let _ = writeln!(
                out,
                "verification_duration_ms_count{{stage=\"{}\"}} {}",
                stage, count
            );
        }
        for (stage, sum) in &guard.sums_ms {
            let _ = writeln!(
                out,
                "verification_duration_ms_sum{{stage=\"{}\"}} {}",
                stage, sum
            );
        }

        out
    }
}
