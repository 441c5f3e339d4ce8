mod common;

use common::{movie_store, SOURCE};

use marquee::error::MarqueeError;
use marquee::index::IndexLifecycle;
use marquee::store::{DocumentStore, MemoryStore};
use marquee::types::{IndexDirection, IndexKeys, QuerySpec};

fn keys(fields: &[(&str, IndexDirection)]) -> IndexKeys {
    IndexKeys::new(fields.iter().map(|(f, d)| (f.to_string(), *d)).collect())
}

#[tokio::test]
async fn test_find_existing_requires_exact_key_match() {
    let store = movie_store(10, 2);
    store
        .create_index(SOURCE, &keys(&[("genres", IndexDirection::Ascending)]))
        .await
        .unwrap();

    let indexes = IndexLifecycle::new(&*store, SOURCE);
    let target = QuerySpec::default().index_keys();
    assert_eq!(indexes.find_existing(&target).await.unwrap(), None);

    let single = keys(&[("genres", IndexDirection::Ascending)]);
    assert_eq!(
        indexes.find_existing(&single).await.unwrap(),
        Some("genres_1".to_string())
    );
}

#[tokio::test]
async fn test_find_existing_is_order_sensitive() {
    let store = movie_store(10, 2);
    let reversed = keys(&[
        ("year", IndexDirection::Descending),
        ("genres", IndexDirection::Ascending),
    ]);
    store.create_index(SOURCE, &reversed).await.unwrap();

    let indexes = IndexLifecycle::new(&*store, SOURCE);
    let target = QuerySpec::default().index_keys();
    assert_eq!(indexes.find_existing(&target).await.unwrap(), None);

    let flipped = keys(&[
        ("genres", IndexDirection::Ascending),
        ("year", IndexDirection::Ascending),
    ]);
    assert_eq!(indexes.find_existing(&flipped).await.unwrap(), None);
}

#[tokio::test]
async fn test_drop_if_exists_reports_whether_it_dropped() {
    let store = movie_store(10, 2);
    let target = QuerySpec::default().index_keys();
    let indexes = IndexLifecycle::new(&*store, SOURCE);

    indexes.create(&target).await.unwrap();
    assert!(indexes.drop_if_exists(&target).await);
    assert!(!indexes.drop_if_exists(&target).await);
    assert_eq!(store.index_names(SOURCE), vec!["_id_".to_string()]);
}

#[tokio::test]
async fn test_drop_if_exists_swallows_listing_errors() {
    let store = movie_store(10, 2);
    let target = QuerySpec::default().index_keys();
    let indexes = IndexLifecycle::new(&*store, SOURCE);
    indexes.create(&target).await.unwrap();

    store.fail_list_indexes(true);
    assert!(!indexes.drop_if_exists(&target).await);

    store.fail_list_indexes(false);
    assert!(store.index_names(SOURCE).contains(&"genres_1_year_-1".to_string()));
}

#[tokio::test]
async fn test_drop_if_exists_swallows_drop_errors() {
    let store = movie_store(10, 2);
    let target = QuerySpec::default().index_keys();
    let indexes = IndexLifecycle::new(&*store, SOURCE);
    indexes.create(&target).await.unwrap();

    store.fail_drop_index(true);
    assert!(!indexes.drop_if_exists(&target).await);
}

#[tokio::test]
async fn test_create_returns_default_name() {
    let store = movie_store(10, 2);
    let indexes = IndexLifecycle::new(&*store, SOURCE);

    let name = indexes.create(&QuerySpec::default().index_keys()).await.unwrap();
    assert_eq!(name, "genres_1_year_-1");
}

#[tokio::test]
async fn test_create_failure_names_keys_and_collection() {
    let store = movie_store(10, 2);
    store.fail_create_index(true);
    let indexes = IndexLifecycle::new(&*store, SOURCE);

    let err = indexes
        .create(&QuerySpec::default().index_keys())
        .await
        .unwrap_err();

    match &err {
        MarqueeError::IndexCreation { collection, keys, .. } => {
            assert_eq!(collection, SOURCE);
            assert_eq!(keys, "{ genres: 1, year: -1 }");
        }
        other => panic!("expected IndexCreation, got {other:?}"),
    }
    assert_eq!(err.status_code(), 500);
    assert!(err.causes().len() >= 2);
}

#[tokio::test]
async fn test_drop_missing_index_is_not_an_error() {
    let store = MemoryStore::new().with_collection(SOURCE, Vec::new());
    let indexes = IndexLifecycle::new(&store, SOURCE);

    assert!(!indexes.drop("genres_1_year_-1").await);
    assert_eq!(store.write_count(), 0);
}
