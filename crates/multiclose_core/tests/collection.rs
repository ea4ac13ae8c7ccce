//! Integration tests for `CloseableCollection`.
//!
//! Covers close ordering, failure aggregation, misuse after close, concurrent
//! closing, and bounding a slow close from async code.

mod common;

use common::{CloseLog, Resource, causes};
use multiclose_core::close::{BoxError, Close};
use multiclose_core::collection::CloseableCollection;
use multiclose_core::error::{AggregateError, ClosingResourceFailed, CollectionClosed};
use multiclose_tracing::LogConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

// ─────────────────────────────────────────────────────────────────────────
// Custom aggregate error
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("shutdown failed")]
struct ShutdownError {
    causes: Vec<BoxError>,
}

impl AggregateError for ShutdownError {
    fn add_suppressed(&mut self, error: BoxError) {
        self.causes.push(error);
    }

    fn suppressed(&self) -> &[BoxError] {
        &self.causes
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn empty_collection_closes_cleanly() {
    let collection = CloseableCollection::new();
    assert!(collection.close().is_ok());
}

#[test]
fn empty_collection_with_custom_errors_closes_cleanly() {
    let collection = CloseableCollection::with_errors(|| ShutdownError { causes: Vec::new() });
    assert_eq!(collection.len(), 0);
    assert!(collection.close().is_ok());
}

#[test]
fn resources_are_closed() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();

    let r0 = collection.add(Resource::new(0, &log)).unwrap();
    assert_eq!(collection.len(), 1);
    let r1 = collection.add(Resource::new(1, &log)).unwrap();
    assert_eq!(collection.len(), 2);
    let r2 = collection.add(Resource::new(2, &log)).unwrap();
    assert_eq!(collection.len(), 3);

    collection.close().unwrap();

    assert!(r0.closed(), "r0 closed");
    assert!(r1.closed(), "r1 closed");
    assert!(r2.closed(), "r2 closed");
    assert!(collection.is_empty());
}

#[test]
fn resources_are_closed_in_reverse_order() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();

    let a = collection.add(Resource::new(0, &log)).unwrap();
    let b = collection.add(Resource::new(1, &log)).unwrap();
    let c = collection.add(Resource::new(2, &log)).unwrap();
    collection.close().unwrap();

    assert_eq!(log.order(), [c.id, b.id, a.id]);
}

#[test]
fn crashing_resources_do_not_prevent_closing() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();

    let r0 = collection.add(Resource::new(0, &log)).unwrap();
    let r1 = collection.add(Resource::crasher(1, &log)).unwrap();
    let r2 = collection.add(Resource::new(2, &log)).unwrap();
    let r3 = collection.add(Resource::crasher(3, &log)).unwrap();
    assert_eq!(collection.len(), 4);

    let error = collection.close().unwrap_err();

    assert!(r0.closed(), "r0 closed");
    assert!(r1.closed(), "r1 closed");
    assert!(r2.closed(), "r2 closed");
    assert!(r3.closed(), "r3 closed");

    assert_eq!(error.message(), Some("One or more resources could not be closed."));
    assert_eq!(causes(error.suppressed()), ["Failed 3", "Failed 1"]);
    assert_eq!(log.order(), [3, 2, 1, 0]);
}

#[test]
fn custom_error_factory_receives_failures() {
    let log = CloseLog::default();
    let collection = CloseableCollection::with_errors(|| ShutdownError { causes: Vec::new() });

    collection.add(Resource::crasher(0, &log)).unwrap();
    collection.add(Resource::new(1, &log)).unwrap();

    let error = collection.close().unwrap_err();
    assert_eq!(error.to_string(), "shutdown failed");
    assert_eq!(causes(&error.causes), ["Failed 0"]);
}

#[test]
fn add_after_close_is_rejected() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();
    collection.close().unwrap();

    let late = Resource::new(0, &log);
    let result = collection.add(Arc::clone(&late));

    assert_eq!(result.err(), Some(CollectionClosed));
    assert_eq!(collection.len(), 0);
    assert!(!late.closed());
}

#[test]
fn second_close_is_a_noop() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();
    let r0 = collection.add(Resource::crasher(0, &log)).unwrap();

    assert!(collection.close().is_err());
    assert!(collection.close().is_ok());
    assert_eq!(r0.attempts(), 1);
}

#[test]
fn concurrent_close_closes_each_resource_once() {
    for _ in 0..100 {
        let log = CloseLog::default();
        let resources: Vec<_> = (0..1000).map(|id| Resource::new(id, &log)).collect();

        let collection = CloseableCollection::new();
        for resource in &resources {
            collection.add(Arc::clone(resource)).unwrap();
        }

        std::thread::scope(|scope| {
            for _ in 0..20 {
                scope.spawn(|| collection.close().unwrap());
            }
        });

        for resource in &resources {
            assert!(resource.closed());
            assert_eq!(resource.attempts(), 1, "resource {} closed once", resource.id);
        }
        let expected: Vec<usize> = (0..1000).rev().collect();
        assert_eq!(log.order(), expected);
    }
}

#[test]
fn concurrent_add_and_close_never_leaks() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();

    let accepted: Vec<Arc<Resource>> = std::thread::scope(|scope| {
        let adders: Vec<_> = (0..4)
            .map(|thread| {
                let collection = &collection;
                let log = &log;
                scope.spawn(move || {
                    (0..250)
                        .filter_map(|n| collection.add(Resource::new(thread * 250 + n, log)).ok())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        scope.spawn(|| collection.close().unwrap());

        adders
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    // Every accepted resource was drained by the racing close.
    assert!(collection.is_empty());
    for resource in &accepted {
        assert_eq!(resource.attempts(), 1, "resource {} closed once", resource.id);
    }
    assert_eq!(log.order().len(), accepted.len());
}

#[test]
fn concurrent_close_reports_failures_to_exactly_one_caller() {
    for _ in 0..50 {
        let log = CloseLog::default();
        let resources: Vec<_> = (0..200)
            .map(|id| {
                if id % 3 == 0 {
                    Resource::crasher(id, &log)
                } else {
                    Resource::new(id, &log)
                }
            })
            .collect();
        let crashers = resources.iter().filter(|r| r.id % 3 == 0).count();

        let collection = CloseableCollection::new();
        for resource in &resources {
            collection.add(Arc::clone(resource)).unwrap();
        }

        let results: Vec<_> = std::thread::scope(|scope| {
            let closers: Vec<_> = (0..16).map(|_| scope.spawn(|| collection.close())).collect();
            closers
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        let errors: Vec<_> = results.into_iter().filter_map(Result::err).collect();
        assert_eq!(errors.len(), 1, "only the closing caller sees the aggregate");
        assert_eq!(errors[0].suppressed().len(), crashers);
        for resource in &resources {
            assert_eq!(resource.attempts(), 1, "resource {} closed once", resource.id);
        }
    }
}

#[test]
fn failures_are_logged_while_draining() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();
    collection.add(Resource::new(0, &log)).unwrap();
    collection.add(Resource::crasher(1, &log)).unwrap();

    let (result, events) = LogConfig::new()
        .with_level(Level::DEBUG)
        .capture(|| collection.close())
        .unwrap();
    assert_eq!(causes(result.unwrap_err().suppressed()), ["Failed 1"]);

    let failures: Vec<_> = events.iter().filter(|e| e.is_failure()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].target, "multiclose_core::drain");
    assert_eq!(failures[0].message, "resource failed to close");
    assert_eq!(failures[0].error.as_deref(), Some("Failed 1"));

    let summary = events
        .iter()
        .find(|e| e.message == "drain finished with failures")
        .expect("drain summary logged");
    assert_eq!(summary.level, Level::DEBUG);
    assert_eq!(summary.closed, Some(2));
    assert_eq!(summary.failed, Some(1));
}

#[test]
fn clean_close_logs_nothing_at_default_level() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();
    collection.add(Resource::new(0, &log)).unwrap();

    let (result, events) = LogConfig::new().capture(|| collection.close()).unwrap();
    assert!(result.is_ok());
    assert!(events.is_empty());
}

#[test]
fn dropping_collection_logs_aggregate() {
    let log = CloseLog::default();
    let collection = CloseableCollection::new();
    let r0 = collection.add(Resource::crasher(0, &log)).unwrap();

    let ((), events) = LogConfig::new().capture(|| drop(collection)).unwrap();

    assert!(r0.closed());
    let dropped = events
        .iter()
        .find(|e| e.message == "resources failed to close while dropping collection")
        .expect("drop failure logged");
    assert_eq!(dropped.target, "multiclose_core::collection");
    assert_eq!(dropped.failed, Some(1));
}

#[test]
fn aggregate_converts_into_boxed_error() {
    fn teardown(collection: &CloseableCollection) -> Result<(), BoxError> {
        collection.close()?;
        Ok(())
    }

    let log = CloseLog::default();
    let collection = CloseableCollection::new();
    collection.add(Resource::crasher(7, &log)).unwrap();

    let error = teardown(&collection).unwrap_err();
    let aggregate = error.downcast::<ClosingResourceFailed>().unwrap();
    assert_eq!(causes(aggregate.suppressed()), ["Failed 7"]);
}

// ─────────────────────────────────────────────────────────────────────────
// Bounding close externally
// ─────────────────────────────────────────────────────────────────────────

struct SlowResource(Duration);

impl Close for SlowResource {
    fn close(&self) -> Result<(), BoxError> {
        std::thread::sleep(self.0);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_close_can_be_bounded_by_caller() {
    let collection = Arc::new(CloseableCollection::new());
    collection
        .add(Arc::new(SlowResource(Duration::from_millis(500))))
        .unwrap();

    let closing = Arc::clone(&collection);
    let mut task = tokio::task::spawn_blocking(move || closing.close());

    let timed_out = tokio::time::timeout(Duration::from_millis(10), &mut task).await;
    assert!(timed_out.is_err(), "close should outlive the caller's bound");

    // The drain keeps going in the background and still completes.
    let result = task.await.expect("close task did not panic");
    assert!(result.is_ok());
    assert!(collection.is_closed());
    assert!(collection.is_empty());
}

#[tokio::test]
async fn fast_close_completes_within_bound() {
    let log = CloseLog::default();
    let collection = Arc::new(CloseableCollection::new());
    let r0 = collection.add(Resource::new(0, &log)).unwrap();

    let closing = Arc::clone(&collection);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::task::spawn_blocking(move || closing.close()),
    )
    .await
    .expect("close finished in time")
    .expect("close task did not panic");

    assert!(result.is_ok());
    assert!(r0.closed());
}
