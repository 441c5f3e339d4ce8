//! Latency measurement for a fixed query.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{MarqueeError, Result};
use crate::store::DocumentStore;
use crate::types::QuerySpec;

/// Upper bound on timed runs per phase.
pub const MAX_RUNS: usize = 10_000;

const PREALLOCATED_RUNS: usize = 1024;

/// Monotonic time source. Readings are offsets from an arbitrary origin;
/// only differences between readings are meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock that advances by `step` on every reading, so each
/// timed run measures exactly `step`.
#[derive(Debug)]
pub struct StepClock {
    step: Duration,
    ticks: AtomicU64,
}

impl StepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            ticks: AtomicU64::new(0),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> Duration {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        let nanos = self.step.as_nanos().saturating_mul(u128::from(tick));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Median of a sample: the middle element for odd lengths, the mean of
/// the two central elements for even lengths.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Per-run latencies in milliseconds, in execution order. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimingSample(Vec<f64>);

impl TimingSample {
    pub fn runs_ms(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn median(&self) -> f64 {
        median(&self.0).unwrap_or(0.0)
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Run `query` against `collection` `runs` times, one after another,
/// projecting only `_id`. Errors from any run abort the sample.
#[instrument(skip(store, query, clock), fields(collection = collection))]
pub async fn run_timed(
    store: &dyn DocumentStore,
    collection: &str,
    query: &QuerySpec,
    runs: usize,
    clock: &dyn Clock,
) -> Result<TimingSample> {
    if runs == 0 {
        return Err(MarqueeError::Validation("runs must be >= 1".into()));
    }

    let filter = query.to_filter();
    if runs > MAX_RUNS {
        return Err(MarqueeError::Validation(format!(
            "runs must be <= {MAX_RUNS}, got {runs}"
        )));
    }

    let mut times = Vec::with_capacity(runs.min(PREALLOCATED_RUNS));
    for run in 0..runs {
        let t0 = clock.now();
        let returned = store.find_ids(collection, &filter).await?;
        let elapsed_ms = clock.now().saturating_sub(t0).as_nanos() as f64 / 1_000_000.0;

        debug!(run, returned, elapsed_ms, "timed run");
        times.push(elapsed_ms);
    }

    Ok(TimingSample(times))
}
