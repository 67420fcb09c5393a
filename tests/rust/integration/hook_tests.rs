//! Enumeration hooks, exception hooks and the query inspector.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use exprmap::query::{QueryInspector, QueryResult, UseAsDataSource};
use exprmap::{Expr, Value};

use super::fixtures::{mapping, model_query, model_source};

fn counter() -> (Arc<AtomicUsize>, impl Fn(&[Value]) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = count.clone();
    (count, move |_: &[Value]| {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_enumeration_hook_fires_once_per_enumeration() {
    let batch_sizes = Arc::new(Mutex::new(Vec::new()));
    let sizes = batch_sizes.clone();
    let query = model_query()
        .filter("d => d.Nested.AnotherBoolean")
        .unwrap()
        .on_enumerated(move |items| sizes.lock().unwrap().push(items.len()));

    query.to_list().unwrap();
    let mut iter = query.enumerate().unwrap();
    assert_eq!(*batch_sizes.lock().unwrap(), vec![2, 2]);
    assert!(iter.next().is_some());
}

#[test]
fn test_registering_a_hook_replaces_the_previous_one() {
    let (first_count, first) = counter();
    let (second_count, second) = counter();

    let base = model_query().on_enumerated(first);
    let replaced = base.on_enumerated(second);
    replaced.to_list().unwrap();

    assert_eq!(first_count.load(Ordering::SeqCst), 0);
    assert_eq!(second_count.load(Ordering::SeqCst), 1);

    // The original value still carries its own hook
    base.to_list().unwrap();
    assert_eq!(first_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hooks_survive_composition() {
    let (count, hook) = counter();
    model_query()
        .on_enumerated(hook)
        .filter("d => d.Score > 80")
        .unwrap()
        .order_by("d => d.Id")
        .unwrap()
        .to_list()
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_single_results_do_not_fire_enumeration_hook() {
    let (count, hook) = counter();
    let query = model_query().on_enumerated(hook);
    assert_eq!(query.count().unwrap(), 4);
    assert!(query.first_or_default().unwrap().is_some());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[derive(Default)]
struct RecordingInspector {
    events: Mutex<Vec<String>>,
}

impl QueryInspector for RecordingInspector {
    fn start_execute(&self, destination: &Expr, source: &Expr) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {} | {}", destination, source));
    }

    fn source_result(&self, value: &Value) {
        let rows = value.as_list().map(|rows| rows.len()).unwrap_or(0);
        self.events.lock().unwrap().push(format!("source {}", rows));
    }

    fn destination_result(&self, result: &QueryResult) {
        let label = match result {
            QueryResult::Sequence(items) => format!("destination {}", items.len()),
            QueryResult::Single(value) => format!("destination {}", value),
        };
        self.events.lock().unwrap().push(label);
    }
}

#[test]
fn test_inspector_observes_each_stage() {
    let inspector = Arc::new(RecordingInspector::default());
    let mapping = mapping();
    let query = model_source(&mapping)
        .use_as_data_source(mapping)
        .with_inspector(inspector.clone())
        .for_type("Dto")
        .unwrap()
        .filter("d => d.Nested.AnotherBoolean")
        .unwrap();

    query.to_list().unwrap();
    query.count().unwrap();

    let events = inspector.events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            "start source<Dto>.where(d => d.Nested.AnotherBoolean) | source<Model>.where(d => d.ABoolean)"
                .to_string(),
            "source 2".to_string(),
            "destination 2".to_string(),
            "start source<Dto>.where(d => d.Nested.AnotherBoolean).count() | source<Model>.where(d => d.ABoolean).count()"
                .to_string(),
            "source 0".to_string(),
            "destination 2".to_string(),
        ]
    );
}
