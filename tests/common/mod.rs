#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use marquee::config::DiagnosticsConfig;
use marquee::store::MemoryStore;
use marquee::timing::StepClock;

pub const SOURCE: &str = "movies";
pub const DEMO: &str = "movies_demo";

/// Diagnostics settings pointing at the test collections.
pub fn diagnostics(batch_size: usize) -> DiagnosticsConfig {
    DiagnosticsConfig {
        source_collection: SOURCE.to_string(),
        demo_collection: DEMO.to_string(),
        copy_batch_size: batch_size,
        ..Default::default()
    }
}

/// A store holding `total` movies in the source collection, `matching` of
/// which satisfy the default Action/2010 query.
pub fn movie_store(total: usize, matching: usize) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_collection(SOURCE, fixtures::movies(total, matching)))
}

/// Clock where every timed run takes exactly `ms` milliseconds.
pub fn step_clock(ms: u64) -> StepClock {
    StepClock::new(Duration::from_millis(ms))
}
