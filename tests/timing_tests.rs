mod common;

use common::{movie_store, step_clock, SOURCE};

use assert_approx_eq::assert_approx_eq;
use marquee::error::MarqueeError;
use marquee::store::MemoryStore;
use marquee::timing::{median, run_timed, MAX_RUNS};
use marquee::types::QuerySpec;
use proptest::prelude::*;

#[tokio::test]
async fn test_each_run_is_timed_once() {
    let store = movie_store(200, 20);
    let clock = step_clock(4);

    let sample = run_timed(&*store, SOURCE, &QuerySpec::default(), 3, &clock)
        .await
        .unwrap();

    assert_eq!(sample.runs_ms(), &[4.0, 4.0, 4.0]);
    assert_eq!(sample.median(), 4.0);
    assert_eq!(store.find_count(), 3);
}

#[tokio::test]
async fn test_zero_runs_rejected_without_querying() {
    let store = movie_store(10, 1);
    let clock = step_clock(1);

    let err = run_timed(&*store, SOURCE, &QuerySpec::default(), 0, &clock)
        .await
        .unwrap_err();

    assert!(matches!(err, MarqueeError::Validation(_)));
    assert_eq!(store.find_count(), 0);
}

#[tokio::test]
async fn test_failed_run_aborts_sample() {
    let store = MemoryStore::new()
        .with_collection(SOURCE, common::fixtures::movies(50, 5))
        .with_find_budget(2);
    let clock = step_clock(1);

    let err = run_timed(&store, SOURCE, &QuerySpec::default(), 5, &clock)
        .await
        .unwrap_err();

    assert!(matches!(err, MarqueeError::Store(_)));
    // Two successful runs, then the failing third; nothing after it.
    assert_eq!(store.find_count(), 3);
}

#[tokio::test]
async fn test_huge_run_count_rejected_without_allocating() {
    let store = MemoryStore::new()
        .with_collection(SOURCE, common::fixtures::movies(10, 1))
        .with_find_budget(0);
    let clock = step_clock(1);

    let err = run_timed(&store, SOURCE, &QuerySpec::default(), 1usize << 44, &clock)
        .await
        .unwrap_err();

    assert!(matches!(err, MarqueeError::Validation(_)));
    assert_eq!(store.find_count(), 0);
}

#[tokio::test]
async fn test_max_runs_fails_on_first_find() {
    let store = MemoryStore::new()
        .with_collection(SOURCE, common::fixtures::movies(10, 1))
        .with_find_budget(0);
    let clock = step_clock(1);

    let err = run_timed(&store, SOURCE, &QuerySpec::default(), MAX_RUNS, &clock)
        .await
        .unwrap_err();

    assert!(matches!(err, MarqueeError::Store(_)));
    assert_eq!(store.find_count(), 1);
}

#[tokio::test]
async fn test_missing_collection_times_empty_result() {
    let store = MemoryStore::new();
    let clock = step_clock(2);

    let sample = run_timed(&store, "nowhere", &QuerySpec::default(), 2, &clock)
        .await
        .unwrap();
    assert_eq!(sample.len(), 2);
}

#[test]
fn test_median_odd_and_even() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    assert_eq!(median(&[7.25]), Some(7.25));
    assert_eq!(median(&[]), None);
}

#[test]
fn test_median_of_fractional_latencies() {
    let m = median(&[0.31, 1.07, 0.42, 0.88]).unwrap();
    assert_approx_eq!(m, 0.65, 1e-9);
}

proptest! {
    #[test]
    fn prop_median_is_bounded_by_sample(samples in prop::collection::vec(0.0f64..10_000.0, 1..64)) {
        let m = median(&samples).unwrap();
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(m >= min && m <= max);
    }

    #[test]
    fn prop_median_splits_sample_in_half(samples in prop::collection::vec(0.0f64..10_000.0, 1..64)) {
        let m = median(&samples).unwrap();
        let half = (samples.len() + 1) / 2;
        let at_or_below = samples.iter().filter(|s| **s <= m).count();
        let at_or_above = samples.iter().filter(|s| **s >= m).count();
        prop_assert!(at_or_below >= half, "{at_or_below} of {} samples <= {m}", samples.len());
        prop_assert!(at_or_above >= half, "{at_or_above} of {} samples >= {m}", samples.len());
    }

    #[test]
    fn prop_median_ignores_order(mut samples in prop::collection::vec(0.0f64..10_000.0, 1..64)) {
        let m = median(&samples);
        samples.reverse();
        prop_assert_eq!(median(&samples), m);
    }
}
