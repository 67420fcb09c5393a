//! Async execution through sources with async capability.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use exprmap::query::{QueryError, UseAsDataSource};

use super::fixtures::{
    async_model_query, bool_model_query, ids, mapping, model_query, models, nested_flag,
};

#[tokio::test]
async fn test_to_list_async_over_async_source() {
    let token = CancellationToken::new();
    let result = async_model_query()
        .filter("dto => dto.Nested.AnotherBoolean")
        .unwrap()
        .to_list_async(&token)
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|dto| nested_flag(dto) == Some(true)));
}

#[tokio::test]
async fn test_single_results_async() {
    let token = CancellationToken::new();
    let query = async_model_query()
        .filter("dto => dto.Nested.AnotherBoolean")
        .unwrap();

    let first = query.first_or_default_async(&token).await.unwrap();
    assert_eq!(first.as_ref().map(|dto| nested_flag(dto)), Some(Some(true)));
    assert_eq!(query.count_async(&token).await.unwrap(), 2);

    let none = query
        .filter("dto => dto.Score > 1000")
        .unwrap()
        .first_or_default_async(&token)
        .await
        .unwrap();
    assert_eq!(none, None);
}

#[tokio::test]
async fn test_async_matches_sync() {
    let token = CancellationToken::new();
    for predicate in [
        "d => d.Nested.AnotherBoolean",
        "d => d.Shade == Shade::Cool",
        "d => d.FullName.len() > 11",
    ] {
        let sync = model_query().filter(predicate).unwrap().to_list().unwrap();
        let asynchronous = async_model_query()
            .filter(predicate)
            .unwrap()
            .to_list_async(&token)
            .await
            .unwrap();
        assert_eq!(sync, asynchronous, "predicate {}", predicate);
    }
}

#[tokio::test]
async fn test_sync_only_source_is_unsupported_before_translation() {
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    // `Id` has no mapping from `BoolModel`, so translating would fail too
    let query = bool_model_query()
        .filter("d => d.Id > 1")
        .unwrap()
        .on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let err = query
        .to_list_async(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedOperation(_)));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let err = async_model_query().to_list_async(&token).await.unwrap_err();
    assert_eq!(err, QueryError::Cancelled);
}

#[tokio::test]
async fn test_cancellation_between_items() {
    let token = CancellationToken::new();
    let enumerated = Arc::new(AtomicBool::new(false));
    let flag = enumerated.clone();
    let mut stream = async_model_query()
        .on_enumerated(move |items| {
            assert_eq!(items.len(), 4);
            flag.store(true, Ordering::SeqCst);
        })
        .enumerate_async(token.clone());

    let first = stream.next().await.unwrap().unwrap();
    assert!(enumerated.load(Ordering::SeqCst));
    assert_eq!(ids(&[first]), vec![1]);

    token.cancel();
    assert_eq!(stream.next().await, Some(Err(QueryError::Cancelled)));
    assert_eq!(stream.next().await, None);
}

#[test]
fn test_async_path_from_blocking_context() {
    let mapping = mapping();
    let source = exprmap::AsyncInMemorySource::new(exprmap::InMemorySource::new(
        mapping.shared_catalog(),
        "Model",
        models(),
    ));
    let query = source.use_as_data_source(mapping).for_type("Dto").unwrap();
    let token = CancellationToken::new();

    let count = tokio_test::block_on(query.count_async(&token)).unwrap();
    assert_eq!(count, 4);
}
