//! Failure propagation: every failure reaches the exception hook exactly once
//! and is returned to the caller; no partial results.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mockall::mock;

use exprmap::query::{DataSource, QueryError, SourceError, UseAsDataSource};
use exprmap::{Expr, TranslationConfig, Value};

use super::fixtures::{bool_model_query, mapping, model_source};

mock! {
    pub Source {}

    impl DataSource for Source {
        fn element_type(&self) -> String;
        fn execute(&self, expr: &Expr) -> Result<Value, SourceError>;
    }
}

#[test]
fn test_missing_member_mapping_reaches_exception_hook_once() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = errors.clone();
    let query = bool_model_query()
        .on_error(move |err| seen.lock().unwrap().push(err.clone()))
        .filter("d => d.Id == 1")
        .unwrap();

    let err = query.to_list().unwrap_err();
    let expected = QueryError::MappingNotFound {
        source_type: "BoolModel".to_string(),
        destination_type: "Dto".to_string(),
        member: "Id".to_string(),
    };
    assert_eq!(err, expected);
    assert_eq!(*errors.lock().unwrap(), vec![expected]);
}

#[test]
fn test_source_failure_is_execution_failed() {
    let mut source = MockSource::new();
    source
        .expect_element_type()
        .return_const("Model".to_string());
    source
        .expect_execute()
        .withf(|expr: &Expr| expr.to_string() == "source<Model>.where(d => d.ABoolean)")
        .times(1)
        .returning(|_| Err(SourceError::Backend("connection reset".to_string())));

    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let query = source
        .use_as_data_source(mapping())
        .on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .for_type("Dto")
        .unwrap()
        .filter("d => d.Nested.AnotherBoolean")
        .unwrap();

    let err = query.to_list().unwrap_err();
    assert_eq!(
        err,
        QueryError::ExecutionFailed(SourceError::Backend("connection reset".to_string()))
    );
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sequence_expected_from_source() {
    let mut source = MockSource::new();
    source
        .expect_element_type()
        .return_const("Model".to_string());
    source.expect_execute().returning(|_| Ok(Value::Int(7)));

    let err = source
        .use_as_data_source(mapping())
        .for_type("Dto")
        .unwrap()
        .to_list()
        .unwrap_err();
    assert!(matches!(err, QueryError::ExecutionFailed(SourceError::Backend(_))));
}

#[test]
fn test_depth_limit_fails_translation() {
    let mapping = mapping();
    let config = TranslationConfig {
        max_expression_depth: 4,
        ..Default::default()
    };
    let query = model_source(&mapping)
        .use_as_data_source(mapping)
        .with_config(config)
        .for_type("Dto")
        .unwrap()
        .filter("d => d.Score > 1 && (d.Score < 100 || (d.Id == 2 && d.Nested.AnotherBoolean))")
        .unwrap();

    assert!(matches!(
        query.to_list(),
        Err(QueryError::TranslationFailed { .. })
    ));
}

#[test]
fn test_projections_map_back_or_fail() {
    let mapping = mapping();
    let query = model_source(&mapping)
        .use_as_data_source(mapping)
        .for_type("Dto")
        .unwrap();
    // A projection onto the nested record maps through `Model -> DtoNested`
    let nested = query.select("d => d.Nested").unwrap().to_list().unwrap();
    assert_eq!(nested.len(), 4);

    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let err = bool_model_query()
        .on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .select("d => d.FullName")
        .unwrap()
        .to_list()
        .unwrap_err();
    assert!(matches!(err, QueryError::MappingNotFound { .. }));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}
