//! Tests for the per-connection statement cache

use std::num::NonZeroUsize;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlsampler_core::{Connection, SamplerError, sql_types};

use super::{PrepareKind, StatementCache};
use crate::config::EngineSettings;
use crate::test_helpers::{Binding, MockConnection, initialize_logging};

fn cache(capacity: usize) -> StatementCache {
    StatementCache::new(NonZeroUsize::new(capacity).unwrap())
}

#[test]
fn test_capacity_comes_from_settings() {
    let settings = EngineSettings::default().with_max_open_statements(3);
    assert_eq!(StatementCache::from_settings(&settings).unwrap().capacity(), 3);

    let zero = EngineSettings::default().with_max_open_statements(0);
    assert!(matches!(
        StatementCache::from_settings(&zero),
        Err(SamplerError::Configuration(_))
    ));
}

#[test]
fn test_same_text_and_kind_returns_same_instance() {
    initialize_logging();
    let cache = cache(10);
    let conn = MockConnection::new();

    let first = cache.get(&conn, "SELECT 1", PrepareKind::Prepared, 0).unwrap();
    let second = cache.get(&conn, "SELECT 1", PrepareKind::Prepared, 0).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(conn.state.lock().prepared, vec!["SELECT 1"]);
    assert_eq!(cache.statement_count(conn.id()), 1);
}

#[test]
fn test_kinds_are_cached_separately() {
    let cache = cache(10);
    let conn = MockConnection::new();

    let prepared = cache.get(&conn, "{call p()}", PrepareKind::Prepared, 0).unwrap();
    let callable = cache.get(&conn, "{call p()}", PrepareKind::Callable, 0).unwrap();

    assert!(!Arc::ptr_eq(&prepared, &callable));
    assert_eq!(callable.lock().kind(), PrepareKind::Callable);
    assert_eq!(cache.statement_count(conn.id()), 2);
}

#[test]
fn test_overflow_closes_least_recently_used_exactly_once() {
    initialize_logging();
    let cache = cache(2);
    let conn = MockConnection::new();

    let a = cache.get(&conn, "A", PrepareKind::Prepared, 0).unwrap();
    cache.get(&conn, "B", PrepareKind::Prepared, 0).unwrap();
    // touch A so B becomes the eviction candidate
    cache.get(&conn, "A", PrepareKind::Prepared, 0).unwrap();
    cache.get(&conn, "C", PrepareKind::Prepared, 0).unwrap();

    assert_eq!(conn.state.lock().closed, vec!["B"]);
    assert_eq!(cache.statement_count(conn.id()), 2);
    assert!(!a.lock().is_closed());

    cache.get(&conn, "D", PrepareKind::Prepared, 0).unwrap();
    assert_eq!(conn.state.lock().closed, vec!["B", "A"]);
    assert!(a.lock().is_closed());

    // evicted text is prepared afresh
    let b = cache.get(&conn, "B", PrepareKind::Prepared, 0).unwrap();
    assert!(!b.lock().is_closed());
    assert_eq!(conn.state.lock().prepared, vec!["A", "B", "C", "D", "B"]);
}

#[test]
fn test_timeout_reapplied_only_when_changed() {
    let cache = cache(10);
    let conn = MockConnection::new();

    cache.get(&conn, "Q", PrepareKind::Prepared, 5).unwrap();
    cache.get(&conn, "Q", PrepareKind::Prepared, 5).unwrap();
    let shared = cache.get(&conn, "Q", PrepareKind::Prepared, 30).unwrap();

    assert_eq!(
        conn.state.lock().timeouts,
        vec![("Q".to_string(), 5), ("Q".to_string(), 30)]
    );
    assert_eq!(shared.lock().timeout_secs(), 30);
}

#[test]
fn test_reuse_clears_parameters() {
    let cache = cache(10);
    let conn = MockConnection::new();

    let shared = cache.get(&conn, "Q", PrepareKind::Prepared, 0).unwrap();
    shared
        .lock()
        .statement_mut()
        .set_object(1, "x", sql_types::VARCHAR)
        .unwrap();
    let clears_after_first = conn.state.lock().clears;

    cache.get(&conn, "Q", PrepareKind::Prepared, 0).unwrap();
    assert_eq!(conn.state.lock().clears, clears_after_first + 1);
    assert_eq!(
        conn.state.lock().bindings,
        vec![Binding::Object {
            index: 1,
            value: "x".into(),
            sql_type: sql_types::VARCHAR,
        }]
    );
}

#[test]
fn test_connections_have_separate_maps() {
    let cache = cache(1);
    let first = MockConnection::new();
    let second = MockConnection::new();

    let a = cache.get(&first, "Q", PrepareKind::Prepared, 0).unwrap();
    let b = cache.get(&second, "Q", PrepareKind::Prepared, 0).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(cache.connection_count(), 2);
    assert!(first.state.lock().closed.is_empty());
    assert!(second.state.lock().closed.is_empty());
}

#[test]
fn test_release_closes_connection_statements() {
    let cache = cache(10);
    let conn = MockConnection::new();
    let other = MockConnection::new();

    cache.get(&conn, "A", PrepareKind::Prepared, 0).unwrap();
    cache.get(&conn, "B", PrepareKind::Prepared, 0).unwrap();
    cache.get(&other, "A", PrepareKind::Prepared, 0).unwrap();

    assert_eq!(cache.release(conn.id()), 2);
    assert_eq!(conn.state.lock().closed, vec!["A", "B"]);
    assert_eq!(cache.statement_count(conn.id()), 0);
    assert_eq!(cache.release(conn.id()), 0);

    assert_eq!(cache.clear(), 1);
    assert_eq!(other.state.lock().closed, vec!["A"]);
    assert_eq!(cache.connection_count(), 0);
}

#[test]
fn test_closed_statement_is_not_reused() {
    let cache = cache(10);
    let conn = MockConnection::new();

    let shared = cache.get(&conn, "Q", PrepareKind::Prepared, 0).unwrap();
    shared.lock().close().unwrap();
    shared.lock().close().unwrap();

    assert_eq!(conn.state.lock().closed, vec!["Q"]);
    assert!(matches!(
        cache.get(&conn, "Q", PrepareKind::Prepared, 0),
        Err(sqlsampler_core::SamplerError::StatementClosed)
    ));
}

#[test]
fn test_concurrent_population_from_different_connections() {
    let cache = cache(4);
    let connections: Vec<MockConnection> = (0..8).map(|_| MockConnection::new()).collect();

    std::thread::scope(|scope| {
        for conn in &connections {
            let cache = &cache;
            scope.spawn(move || {
                for i in 0..6 {
                    cache
                        .get(conn, &format!("SELECT {}", i), PrepareKind::Prepared, 0)
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(cache.connection_count(), 8);
    for conn in &connections {
        assert_eq!(cache.statement_count(conn.id()), 4);
        assert_eq!(conn.state.lock().closed, vec!["SELECT 0", "SELECT 1"]);
    }
}
