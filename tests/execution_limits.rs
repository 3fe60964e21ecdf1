//! Execution Limit Tests
//!
//! Tests for execution invariants:
//! - LIMIT 0 never touches storage
//! - Rows are produced lazily as the result set is pulled
//! - Deadlines interrupt statements with a timeout error
//! - Materializing steps stop at the configured element cap

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vertexql::api::QueryEngine;
use vertexql::database::{Database, DatabaseSession, MetadataStore};
use vertexql::executor::{EngineConfig, Parameters};
use vertexql::index::MemoryIndexManager;
use vertexql::planner::{Expr, OrderItem, SelectStatement, SleepStatement, Statement, Target};
use vertexql::schema::MemorySchema;
use vertexql::storage::{
    ClusterInfo, MemoryStorage, Record, RecordCursor, RecordId, RecordStore, ScanDirection,
    StorageResult,
};
use vertexql::value::{Properties, Value};
use vertexql::ErrorKind;

// =============================================================================
// Helper Functions
// =============================================================================

/// Memory storage that counts cluster scans and the records they yield
#[derive(Default)]
struct CountingStore {
    inner: MemoryStorage,
    scans: AtomicUsize,
    scanned_records: Arc<AtomicUsize>,
}

impl RecordStore for CountingStore {
    fn scan_cluster(&self, cluster: u32, direction: ScanDirection) -> StorageResult<RecordCursor> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let scanned = Arc::clone(&self.scanned_records);
        let cursor = self.inner.scan_cluster(cluster, direction)?;
        Ok(Box::new(cursor.inspect(move |_| {
            scanned.fetch_add(1, Ordering::SeqCst);
        })))
    }

    fn fetch_by_rid(&self, rid: RecordId) -> StorageResult<Option<Record>> {
        self.inner.fetch_by_rid(rid)
    }

    fn count_cluster(&self, cluster: u32) -> StorageResult<u64> {
        self.inner.count_cluster(cluster)
    }

    fn clusters(&self) -> StorageResult<Vec<ClusterInfo>> {
        self.inner.clusters()
    }

    fn cluster_id(&self, name: &str) -> StorageResult<Option<u32>> {
        self.inner.cluster_id(name)
    }

    fn create_cluster(&self, name: &str, id: Option<u32>) -> StorageResult<u32> {
        self.inner.create_cluster(name, id)
    }

    fn drop_cluster(&self, cluster: u32) -> StorageResult<()> {
        self.inner.drop_cluster(cluster)
    }

    fn insert(&self, cluster: u32, class_name: &str, properties: Properties) -> StorageResult<Record> {
        self.inner.insert(cluster, class_name, properties)
    }

    fn update(&self, rid: RecordId, properties: Properties) -> StorageResult<Record> {
        self.inner.update(rid, properties)
    }

    fn delete(&self, rid: RecordId) -> StorageResult<bool> {
        self.inner.delete(rid)
    }
}

fn counting_session(store: Arc<CountingStore>, records: usize) -> DatabaseSession {
    let session = DatabaseSession::new(
        "counting",
        store,
        Arc::new(MemorySchema::new()),
        Arc::new(MemoryIndexManager::new()),
        Arc::new(MetadataStore::new()),
    );
    session.create_class("Item", Vec::new(), false).unwrap();
    for i in 0..records {
        let mut props = Properties::new();
        props.set("n", i as i64);
        session.create_record("Item", None, props).unwrap();
    }
    session
}

fn engine_with(config: EngineConfig, records: usize) -> QueryEngine {
    let db = Database::new("limits").unwrap();
    let session = db.session();
    session.create_class("Item", Vec::new(), false).unwrap();
    for i in 0..records {
        let mut props = Properties::new();
        props.set("n", i as i64);
        props.set("group", (i % 3) as i64);
        session.create_record("Item", None, props).unwrap();
    }
    QueryEngine::new(db, config).unwrap()
}

fn capped(max: usize) -> EngineConfig {
    EngineConfig {
        max_heap_elements_per_operation: max,
        ..EngineConfig::default()
    }
}

fn select_items() -> SelectStatement {
    SelectStatement::from_class("Item")
}

// =============================================================================
// Limit Tests
// =============================================================================

/// LIMIT 0 returns nothing without scanning a single cluster.
#[test]
fn test_limit_zero_never_scans() {
    let store = Arc::new(CountingStore::default());
    let session = counting_session(Arc::clone(&store), 5);
    let engine = QueryEngine::new(Database::new("unused").unwrap(), EngineConfig::default()).unwrap();

    let stmt = Statement::Select(select_items().limit(0));
    let rows = engine
        .execute_in(&session, &stmt, Parameters::new())
        .unwrap()
        .collect_rows()
        .unwrap();

    assert!(rows.is_empty());
    assert_eq!(store.scans.load(Ordering::SeqCst), 0);
}

/// The same store is scanned once a limit lets rows through.
#[test]
fn test_positive_limit_scans() {
    let store = Arc::new(CountingStore::default());
    let session = counting_session(Arc::clone(&store), 5);
    let engine = QueryEngine::new(Database::new("unused").unwrap(), EngineConfig::default()).unwrap();

    let stmt = Statement::Select(select_items().limit(2));
    let rows = engine
        .execute_in(&session, &stmt, Parameters::new())
        .unwrap()
        .collect_rows()
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(store.scans.load(Ordering::SeqCst), 1);
}

/// Building a result set does not start the plan.
#[test]
fn test_result_set_is_lazy() {
    let store = Arc::new(CountingStore::default());
    let session = counting_session(Arc::clone(&store), 3);
    let engine = QueryEngine::new(Database::new("unused").unwrap(), EngineConfig::default()).unwrap();

    let mut rs = engine
        .execute_in(&session, &Statement::Select(select_items()), Parameters::new())
        .unwrap();
    assert_eq!(store.scans.load(Ordering::SeqCst), 0);

    assert!(rs.has_next().unwrap());
    assert_eq!(store.scans.load(Ordering::SeqCst), 1);
    rs.close();
    assert!(!rs.has_next().unwrap());
}

/// SKIP and LIMIT bound the rows after ordering.
#[test]
fn test_skip_and_limit_window() {
    let engine = engine_with(EngineConfig::default(), 10);
    let stmt = select_items()
        .order_by(OrderItem::desc(Expr::field("n")))
        .skip(2)
        .limit(3);
    let rows = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap();
    let ns: Vec<i64> = rows.iter().map(|r| r.property("n").and_then(Value::as_i64).unwrap()).collect();
    assert_eq!(ns, vec![7, 6, 5]);
}

/// LIMIT may come from a parameter.
#[test]
fn test_limit_from_parameter() {
    let engine = engine_with(EngineConfig::default(), 10);
    let mut stmt = select_items();
    stmt.limit = Some(Expr::named_param("max"));
    let rows = engine
        .query(&Statement::Select(stmt), Parameters::new().with_named("max", 4i64))
        .unwrap();
    assert_eq!(rows.len(), 4);
}

/// A negative LIMIT is rejected.
#[test]
fn test_negative_limit_rejected() {
    let engine = engine_with(EngineConfig::default(), 3);
    let err = engine
        .query(&Statement::Select(select_items().limit(-1)), Parameters::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandExecution);
}

/// A subquery target is pulled row by row, so an outer LIMIT stops the
/// inner scan early.
#[test]
fn test_subquery_target_pulls_lazily() {
    let store = Arc::new(CountingStore::default());
    let session = counting_session(Arc::clone(&store), 1_000);
    let engine = QueryEngine::new(Database::new("unused").unwrap(), EngineConfig::default()).unwrap();

    let stmt = SelectStatement::from_target(Target::Subquery {
        query: Box::new(select_items()),
    })
    .limit(1);
    let rows = engine
        .execute_in(&session, &Statement::Select(stmt), Parameters::new())
        .unwrap()
        .collect_rows()
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert!(store.scanned_records.load(Ordering::SeqCst) <= 2);
}

/// Rows streamed from a subquery target are not buffered, so the heap cap
/// does not limit them.
#[test]
fn test_subquery_target_streams_past_cap() {
    let engine = engine_with(capped(3), 10);
    let stmt = SelectStatement::from_target(Target::Subquery {
        query: Box::new(select_items()),
    });
    let rows = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap();
    assert_eq!(rows.len(), 10);
}

/// A sort inside a subquery target still honours the heap cap.
#[test]
fn test_subquery_target_inner_sort_capped() {
    let engine = engine_with(capped(3), 10);
    let inner = select_items().order_by(OrderItem::asc(Expr::field("n")));
    let stmt = SelectStatement::from_target(Target::Subquery {
        query: Box::new(inner),
    })
    .limit(1);
    let err = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimit);
}

// =============================================================================
// Timeout Tests
// =============================================================================

/// A statement timeout fires on the first pull after the deadline.
#[test]
fn test_statement_timeout_interrupts_pull() {
    let engine = engine_with(EngineConfig::default(), 50);
    let stmt = Statement::Select(select_items().timeout_ms(5));
    let mut rs = engine.execute(&stmt, Parameters::new()).unwrap();

    thread::sleep(Duration::from_millis(30));

    let err = rs.has_next().unwrap_err();
    assert_eq!(vertexql::Error::from(err).kind(), ErrorKind::Timeout);
    assert!(engine.metrics().snapshot().timeouts >= 1);
}

/// The configured default timeout applies to statements without their own.
#[test]
fn test_default_timeout_interrupts_sleep() {
    let config = EngineConfig {
        default_timeout_ms: Some(20),
        ..EngineConfig::default()
    };
    let engine = engine_with(config, 0);
    let err = engine
        .query(&Statement::Sleep(SleepStatement { millis: 2_000 }), Parameters::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.code(), "VQL_TIMEOUT");
}

/// A sleep within the deadline completes and reports itself.
#[test]
fn test_short_sleep_completes() {
    let config = EngineConfig {
        default_timeout_ms: Some(5_000),
        ..EngineConfig::default()
    };
    let engine = engine_with(config, 0);
    let rows = engine
        .query(&Statement::Sleep(SleepStatement { millis: 1 }), Parameters::new())
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].property("operation").and_then(Value::as_str), Some("sleep"));
}

// =============================================================================
// Resource Limit Tests
// =============================================================================

/// An unbounded sort over more rows than the cap fails.
#[test]
fn test_sort_over_cap_fails() {
    let engine = engine_with(capped(3), 5);
    let stmt = select_items().order_by(OrderItem::asc(Expr::field("n")));
    let err = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimit);
}

/// A sort bounded by LIMIT only keeps the top rows and stays under the cap.
#[test]
fn test_bounded_sort_under_cap() {
    let engine = engine_with(capped(3), 5);
    let stmt = select_items().order_by(OrderItem::desc(Expr::field("n"))).limit(2);
    let rows = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap();
    let ns: Vec<i64> = rows.iter().map(|r| r.property("n").and_then(Value::as_i64).unwrap()).collect();
    assert_eq!(ns, vec![4, 3]);
}

/// DISTINCT holding more keys than the cap fails.
#[test]
fn test_distinct_over_cap_fails() {
    let engine = engine_with(capped(2), 6);
    let stmt = select_items()
        .project(vertexql::planner::ProjectionItem::field("n"))
        .distinct();
    let err = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimit);
}

/// GROUP BY with fewer groups than the cap succeeds.
#[test]
fn test_group_by_under_cap() {
    let engine = engine_with(capped(3), 9);
    let stmt = select_items()
        .project(vertexql::planner::ProjectionItem::field("group"))
        .project(vertexql::planner::ProjectionItem::new(Expr::count_star()))
        .group_by(Expr::field("group"));
    let rows = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.property("count") == Some(&Value::Long(3))));
}
