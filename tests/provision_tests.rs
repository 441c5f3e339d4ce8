mod common;

use common::{movie_store, DEMO, SOURCE};

use marquee::error::MarqueeError;
use marquee::provision::{copy_in_batches, ensure_demo_collection, CopyMethod};
use marquee::store::MemoryStore;

#[tokio::test]
async fn test_existing_demo_is_left_alone() {
    let store = MemoryStore::new()
        .with_collection(SOURCE, common::fixtures::movies(100, 10))
        .with_collection(DEMO, common::fixtures::movies(3, 1));

    let outcome = ensure_demo_collection(&store, SOURCE, DEMO, 1000).await.unwrap();

    assert!(!outcome.created);
    assert_eq!(outcome.method, None);
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.document_count(DEMO), 3);
}

#[tokio::test]
async fn test_out_copy_is_tried_first() {
    let store = movie_store(1200, 40);

    let outcome = ensure_demo_collection(&*store, SOURCE, DEMO, 1000)
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.method, Some(CopyMethod::Out));
    assert_eq!(outcome.copied, None);
    assert_eq!(store.document_count(DEMO), 1200);
    assert!(store.insert_batches().await.is_empty());
}

#[tokio::test]
async fn test_cursor_copy_fallback_batches() {
    let store = movie_store(2500, 100);
    store.fail_out_copy(true);

    let outcome = ensure_demo_collection(&*store, SOURCE, DEMO, 1000)
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.method, Some(CopyMethod::CursorCopy));
    assert_eq!(outcome.copied, Some(2500));
    assert_eq!(store.insert_batches().await, vec![1000, 1000, 500]);
    assert_eq!(store.document_count(DEMO), 2500);
    assert_eq!(store.document_count(SOURCE), 2500);
}

#[tokio::test]
async fn test_both_copy_paths_failing_is_fatal() {
    let store = movie_store(50, 5);
    store.fail_out_copy(true);
    store.fail_insert(true);

    let err = ensure_demo_collection(&*store, SOURCE, DEMO, 1000)
        .await
        .unwrap_err();

    match &err {
        MarqueeError::Provisioning { demo, bulk, fallback } => {
            assert_eq!(demo, DEMO);
            assert!(bulk.contains("$out"));
            assert!(fallback.contains("insert"));
        }
        other => panic!("expected Provisioning, got {other:?}"),
    }
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_partial_cursor_copy_is_discarded() {
    let store = MemoryStore::new()
        .with_collection(SOURCE, common::fixtures::movies(2500, 100))
        .with_insert_budget(1);
    store.fail_out_copy(true);

    let err = ensure_demo_collection(&store, SOURCE, DEMO, 1000)
        .await
        .unwrap_err();

    assert!(matches!(err, MarqueeError::Provisioning { .. }));
    assert_eq!(store.insert_batches().await, vec![1000]);
    assert!(!store.collection_names().contains(&DEMO.to_string()));
    assert_eq!(store.document_count(DEMO), 0);
    assert_eq!(store.document_count(SOURCE), 2500);
}

#[tokio::test]
async fn test_failed_discard_still_reports_provisioning_error() {
    let store = MemoryStore::new()
        .with_collection(SOURCE, common::fixtures::movies(2500, 100))
        .with_insert_budget(1);
    store.fail_out_copy(true);
    store.fail_drop_collection(true);

    let err = ensure_demo_collection(&store, SOURCE, DEMO, 1000)
        .await
        .unwrap_err();

    match err {
        MarqueeError::Provisioning { fallback, .. } => {
            assert!(fallback.contains("insert"));
        }
        other => panic!("expected Provisioning, got {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_batch_size_rejected() {
    let store = movie_store(5, 1);

    let err = ensure_demo_collection(&*store, SOURCE, DEMO, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, MarqueeError::Validation(_)));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_copy_of_empty_source_writes_nothing() {
    let store = MemoryStore::new().with_collection(SOURCE, Vec::new());

    let copied = copy_in_batches(&store, SOURCE, DEMO, 10).await.unwrap();
    assert_eq!(copied, 0);
    assert!(store.insert_batches().await.is_empty());
}

#[tokio::test]
async fn test_copy_exact_multiple_of_batch() {
    let store = movie_store(30, 3);

    let copied = copy_in_batches(&*store, SOURCE, DEMO, 10).await.unwrap();
    assert_eq!(copied, 30);
    assert_eq!(store.insert_batches().await, vec![10, 10, 10]);
}
