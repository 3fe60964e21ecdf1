//! Query Semantics Tests
//!
//! Tests for end-to-end statement behavior over a fixture database:
//! - Projections, aggregation, HAVING, UNWIND and DISTINCT
//! - LET variables and subqueries
//! - INSERT, UPDATE, DELETE and DELETE VERTEX
//! - Statements sent as JSON behave like statements built in code

use vertexql::api::{QueryEngine, RequestHandler};
use vertexql::database::{Database, Fixture};
use vertexql::executor::{EngineConfig, Parameters, QueryResult};
use vertexql::planner::{
    CompareOp, Condition, DeleteStatement, DeleteVertexStatement, Expr, InsertStatement,
    OrderItem, ProjectionItem, SelectStatement, SetItem, Statement, Target, UpdateStatement,
};
use vertexql::storage::RecordId;
use vertexql::value::{ArithOp, Properties, Value};
use vertexql::ErrorKind;

use chrono::NaiveDate;
use rust_decimal::Decimal;

// =============================================================================
// Helper Functions
// =============================================================================

const FIXTURE: &str = r#"{
    "classes": [
        {"name": "Order", "properties": [
            {"name": "customer", "type": "STRING"},
            {"name": "amount", "type": "INTEGER"}
        ]},
        {"name": "Post", "properties": [{"name": "title", "type": "STRING"}]},
        {"name": "Person", "superclasses": ["V"], "properties": [{"name": "name", "type": "STRING"}]},
        {"name": "Knows", "superclasses": ["E"]}
    ],
    "records": [
        {"class": "Order", "properties": {"customer": "ann", "amount": 10}},
        {"class": "Order", "properties": {"customer": "ann", "amount": 30}},
        {"class": "Order", "properties": {"customer": "bob", "amount": 5}},
        {"class": "Order", "properties": {"customer": "cid", "amount": 40}},
        {"class": "Order", "properties": {"customer": "cid", "amount": 60}},
        {"class": "Post", "properties": {"title": "first", "tags": ["a", "b"]}},
        {"class": "Post", "properties": {"title": "second", "tags": []}},
        {"class": "Person", "properties": {"name": "alice"}},
        {"class": "Person", "properties": {"name": "bob"}}
    ],
    "indexes": [
        {"name": "Order.customer", "class": "Order", "fields": ["customer"], "type": "NOTUNIQUE"}
    ]
}"#;

fn engine() -> QueryEngine {
    let fixture = Fixture::from_json(FIXTURE).unwrap();
    let db = Database::from_fixture("queries", &fixture).unwrap();
    QueryEngine::new(db, EngineConfig::default()).unwrap()
}

fn select(engine: &QueryEngine, stmt: SelectStatement) -> Vec<QueryResult> {
    engine.query(&Statement::Select(stmt), Parameters::new()).unwrap()
}

fn column<'a>(rows: &'a [QueryResult], field: &str) -> Vec<Option<&'a Value>> {
    rows.iter().map(|r| r.property(field)).collect()
}

fn count(engine: &QueryEngine, class: &str) -> i64 {
    let rows = select(
        engine,
        SelectStatement::from_class(class).project(ProjectionItem::new(Expr::count_star())),
    );
    rows[0].property("count").and_then(Value::as_i64).unwrap()
}

fn rid_of(engine: &QueryEngine, class: &str, name: &str) -> RecordId {
    let rows = select(engine, SelectStatement::from_class(class).filter(Condition::eq("name", name)));
    rows[0].identity().unwrap()
}

// =============================================================================
// Projection Tests
// =============================================================================

/// A SELECT without FROM evaluates its projection once.
#[test]
fn test_select_without_target() {
    let engine = engine();
    let stmt = SelectStatement::new()
        .project(ProjectionItem::new(Expr::literal(1i64)).alias("one"))
        .project(ProjectionItem::new(Expr::literal("x")).alias("s"))
        .project(
            ProjectionItem::new(Expr::binary(ArithOp::Mul, Expr::literal(6i64), Expr::literal(7i64)))
                .alias("answer"),
        );
    let rows = select(&engine, stmt);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].property("one"), Some(&Value::Long(1)));
    assert_eq!(rows[0].property("s"), Some(&Value::String("x".to_string())));
    assert_eq!(rows[0].property("answer").and_then(Value::as_i64), Some(42));
}

/// Record rows carry their identity and class; projections do not.
#[test]
fn test_projection_drops_record_identity() {
    let engine = engine();
    let records = select(&engine, SelectStatement::from_class("Post"));
    assert!(records.iter().all(|r| r.identity().is_some()));
    assert_eq!(records[0].to_json()["@class"], "Post");

    let projected = select(&engine, SelectStatement::from_class("Post").project(ProjectionItem::field("title")));
    assert!(projected.iter().all(|r| r.identity().is_none()));
    assert_eq!(projected[0].property_names(), vec!["title".to_string()]);
}

/// Projected fields keep both the value and its numeric or temporal subtype.
#[test]
fn test_projection_keeps_scalar_types() {
    let engine = engine();
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let expected = vec![
        ("i", Value::Int(7)),
        ("l", Value::Long(7_000_000_000)),
        ("f", Value::Float(1.5)),
        ("d", Value::Double(2.25)),
        ("m", Value::Decimal(Decimal::new(1234, 2))),
        ("sh", Value::Short(3)),
        ("s", Value::String("text".to_string())),
        ("b", Value::Boolean(true)),
        ("dt", Value::Date(date)),
    ];

    let session = engine.session();
    session.create_class("Sample", Vec::new(), false).unwrap();
    let mut props = Properties::new();
    for (name, value) in &expected {
        props.set(*name, value.clone());
    }
    session.create_record("Sample", None, props).unwrap();

    let mut stmt = SelectStatement::from_class("Sample");
    for (name, _) in &expected {
        stmt = stmt.project(ProjectionItem::field(name));
    }
    let rows = select(&engine, stmt);
    assert_eq!(rows.len(), 1);
    for (name, value) in &expected {
        assert_eq!(rows[0].property(name), Some(value), "field {}", name);
    }
}

// =============================================================================
// Aggregation Tests
// =============================================================================

/// GROUP BY with sum and HAVING keeps only the qualifying groups.
#[test]
fn test_group_by_with_having() {
    let engine = engine();
    let total = Expr::function("sum", vec![Expr::field("amount")]);
    let stmt = SelectStatement::from_class("Order")
        .project(ProjectionItem::field("customer"))
        .project(ProjectionItem::new(total.clone()).alias("total"))
        .group_by(Expr::field("customer"))
        .having(Condition::compare(total, CompareOp::Gt, Expr::literal(20i64)))
        .order_by(OrderItem::asc(Expr::field("customer")));

    let rows = select(&engine, stmt);
    let customers: Vec<&str> = rows
        .iter()
        .map(|r| r.property("customer").and_then(Value::as_str).unwrap())
        .collect();
    assert_eq!(customers, vec!["ann", "cid"]);
    let totals: Vec<i64> = rows
        .iter()
        .map(|r| r.property("total").and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(totals, vec![40, 100]);
}

/// HAVING substitutes aggregates inside collection and null checks too.
#[test]
fn test_having_with_contains_on_aggregate() {
    let engine = engine();
    let highest = Expr::function("max", vec![Expr::field("amount")]);
    let stmt = SelectStatement::from_class("Order")
        .project(ProjectionItem::field("customer"))
        .group_by(Expr::field("customer"))
        .having(Condition::and(vec![
            Condition::Contains {
                expr: Expr::list(vec![Expr::literal(5i64), Expr::literal(60i64)]),
                value: highest.clone(),
            },
            Condition::IsNotNull { expr: highest },
        ]))
        .order_by(OrderItem::asc(Expr::field("customer")));

    let rows = select(&engine, stmt);
    let customers: Vec<&str> = rows
        .iter()
        .map(|r| r.property("customer").and_then(Value::as_str).unwrap())
        .collect();
    assert_eq!(customers, vec!["bob", "cid"]);
}

/// Aggregates over the whole class produce one row.
#[test]
fn test_aggregates_without_group_by() {
    let engine = engine();
    let stmt = SelectStatement::from_class("Order")
        .project(ProjectionItem::new(Expr::function("min", vec![Expr::field("amount")])).alias("low"))
        .project(ProjectionItem::new(Expr::function("max", vec![Expr::field("amount")])).alias("high"))
        .project(ProjectionItem::new(Expr::function("avg", vec![Expr::field("amount")])).alias("mean"))
        .project(ProjectionItem::new(Expr::function("count", vec![Expr::field("amount")])).alias("n"));
    let rows = select(&engine, stmt);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].property("low").and_then(Value::as_i64), Some(5));
    assert_eq!(rows[0].property("high").and_then(Value::as_i64), Some(60));
    assert_eq!(rows[0].property("mean").and_then(Value::as_i64), Some(29));
    assert_eq!(rows[0].property("n"), Some(&Value::Long(5)));
}

/// Aggregates are rejected in WHERE.
#[test]
fn test_aggregate_in_where_rejected() {
    let engine = engine();
    let stmt = SelectStatement::from_class("Order").filter(Condition::compare(
        Expr::function("sum", vec![Expr::field("amount")]),
        CompareOp::Gt,
        Expr::literal(1i64),
    ));
    let err = engine.query(&Statement::Select(stmt), Parameters::new()).unwrap_err();
    assert_eq!(err.code(), "VQL_INVALID_AGGREGATE");
}

/// A projected field that is neither grouped nor aggregated is rejected.
#[test]
fn test_ungrouped_field_rejected() {
    let engine = engine();
    let stmt = SelectStatement::from_class("Order")
        .project(ProjectionItem::field("amount"))
        .project(ProjectionItem::new(Expr::count_star()))
        .group_by(Expr::field("customer"));
    assert!(engine.query(&Statement::Select(stmt), Parameters::new()).is_err());
}

// =============================================================================
// Unwind and Distinct Tests
// =============================================================================

/// UNWIND yields one row per element and one null row for an empty list.
#[test]
fn test_unwind_lists() {
    let engine = engine();
    let stmt = SelectStatement::from_class("Post")
        .project(ProjectionItem::field("title"))
        .project(ProjectionItem::field("tags"))
        .unwind("tags")
        .order_by(OrderItem::asc(Expr::field("title")));
    let rows = select(&engine, stmt);
    let tags = column(&rows, "tags");
    assert_eq!(rows.len(), 3);
    assert_eq!(tags[0], Some(&Value::String("a".to_string())));
    assert_eq!(tags[1], Some(&Value::String("b".to_string())));
    assert_eq!(tags[2], Some(&Value::Null));
}

/// DISTINCT compares projected values.
#[test]
fn test_distinct_projection() {
    let engine = engine();
    let stmt = SelectStatement::from_class("Order")
        .project(ProjectionItem::field("customer"))
        .distinct();
    assert_eq!(select(&engine, stmt).len(), 3);
}

// =============================================================================
// LET and Subquery Tests
// =============================================================================

/// A query-level LET is visible to the filter.
#[test]
fn test_global_let_in_filter() {
    let engine = engine();
    let stmt = SelectStatement::from_class("Order")
        .let_item("floor", Expr::literal(40i64))
        .filter(Condition::compare(Expr::field("amount"), CompareOp::Ge, Expr::variable("$floor")));
    assert_eq!(select(&engine, stmt).len(), 2);
}

/// IN over a subquery compares against the subquery's single column.
#[test]
fn test_in_subquery() {
    let engine = engine();
    let biggest = SelectStatement::from_class("Order")
        .project(ProjectionItem::new(Expr::function("max", vec![Expr::field("amount")])));
    let stmt = SelectStatement::from_class("Order").filter(Condition::In {
        expr: Expr::field("amount"),
        values: Expr::subquery(biggest),
        negated: false,
    });
    let rows = select(&engine, stmt);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].property("customer").and_then(Value::as_str), Some("cid"));
}

/// Positional parameters bind in order.
#[test]
fn test_positional_parameters() {
    let engine = engine();
    let stmt = SelectStatement::from_class("Order").filter(Condition::and(vec![
        Condition::compare(Expr::field("customer"), CompareOp::Eq, Expr::param(0)),
        Condition::compare(Expr::field("amount"), CompareOp::Gt, Expr::param(1)),
    ]));
    let params = Parameters::positional(vec![Value::from("ann"), Value::from(15i64)]);
    let rows = engine.query(&Statement::Select(stmt), params).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].property("amount").and_then(Value::as_i64), Some(30));
}

// =============================================================================
// Mutation Tests
// =============================================================================

/// UPDATE reports how many records it changed and the change is visible.
#[test]
fn test_update_with_filter() {
    let engine = engine();
    let stmt = Statement::Update(UpdateStatement {
        target: Target::class("Order"),
        set: vec![SetItem::new(
            "amount",
            Expr::binary(ArithOp::Add, Expr::field("amount"), Expr::literal(1i64)),
        )],
        remove: Vec::new(),
        where_clause: Some(Condition::eq("customer", "ann")),
        limit: None,
        timeout_ms: None,
    });
    let rows = engine.query(&stmt, Parameters::new()).unwrap();
    assert_eq!(rows[0].property("count"), Some(&Value::Long(2)));

    let rows = select(&engine, SelectStatement::from_class("Order").filter(Condition::eq("customer", "ann")));
    let mut amounts: Vec<i64> = rows
        .iter()
        .map(|r| r.property("amount").and_then(Value::as_i64).unwrap())
        .collect();
    amounts.sort();
    assert_eq!(amounts, vec![11, 31]);
}

/// INSERT ... FROM copies every selected row into a new record.
#[test]
fn test_insert_from_select() {
    let engine = engine();
    let source = SelectStatement::from_class("Order")
        .project(ProjectionItem::field("customer"))
        .filter(Condition::eq("customer", "cid"));
    let stmt = Statement::Insert(InsertStatement {
        class: "Post".to_string(),
        cluster: None,
        rows: Vec::new(),
        from: Some(Box::new(source)),
    });
    let rows = engine.query(&stmt, Parameters::new()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.class_name() == Some("Post")));
    assert_eq!(count(&engine, "Post"), 4);
}

/// Plain DELETE removes matching records.
#[test]
fn test_delete_with_filter() {
    let engine = engine();
    let stmt = Statement::Delete(DeleteStatement {
        target: Target::class("Order"),
        where_clause: Some(Condition::field("amount", CompareOp::Lt, 35i64)),
        limit: None,
        unsafe_delete: false,
    });
    let rows = engine.query(&stmt, Parameters::new()).unwrap();
    assert_eq!(rows[0].property("count"), Some(&Value::Long(3)));
    assert_eq!(count(&engine, "Order"), 2);
}

/// DELETE FROM an index removes entries by key and leaves the records.
#[test]
fn test_delete_from_index_by_key() {
    let engine = engine();
    let index_entries = |engine: &QueryEngine| {
        select(engine, SelectStatement::from_target(Target::Index { name: "Order.customer".into() })).len()
    };
    assert_eq!(index_entries(&engine), 5);

    let stmt = Statement::Delete(DeleteStatement {
        target: Target::Index { name: "Order.customer".into() },
        where_clause: Some(Condition::eq("key", "ann")),
        limit: None,
        unsafe_delete: false,
    });
    let steps = engine.plan(&engine.session(), &stmt).unwrap().step_names();
    assert_eq!(steps, vec!["FetchFromIndexStep", "DeleteFromIndexStep", "CountStep"]);

    let rows = engine.query(&stmt, Parameters::new()).unwrap();
    assert_eq!(rows[0].property("count"), Some(&Value::Long(2)));
    assert_eq!(index_entries(&engine), 3);
    assert_eq!(count(&engine, "Order"), 5);

    let remaining = select(
        &engine,
        SelectStatement::from_target(Target::Index { name: "Order.customer".into() })
            .filter(Condition::eq("key", "ann")),
    );
    assert!(remaining.is_empty());
}

/// A condition other than on the key filters the index entries instead.
#[test]
fn test_delete_from_index_with_filter_and_limit() {
    let engine = engine();
    let stmt = Statement::Delete(DeleteStatement {
        target: Target::Index { name: "Order.customer".into() },
        where_clause: Some(Condition::field("key", CompareOp::Ne, "bob")),
        limit: Some(Expr::literal(3i64)),
        unsafe_delete: false,
    });
    let steps = engine.plan(&engine.session(), &stmt).unwrap().step_names();
    assert!(steps.contains(&"FilterStep"));

    let rows = engine.query(&stmt, Parameters::new()).unwrap();
    assert_eq!(rows[0].property("count"), Some(&Value::Long(3)));
    let left = select(
        &engine,
        SelectStatement::from_target(Target::Index { name: "Order.customer".into() }),
    );
    assert_eq!(left.len(), 2);
    assert!(left.iter().any(|r| r.property("key") == Some(&Value::from("bob"))));
}

/// Plain DELETE refuses vertex classes unless UNSAFE.
#[test]
fn test_delete_vertex_class_needs_unsafe() {
    let engine = engine();
    let delete = |unsafe_delete| {
        Statement::Delete(DeleteStatement {
            target: Target::class("Person"),
            where_clause: None,
            limit: None,
            unsafe_delete,
        })
    };
    let err = engine.query(&delete(false), Parameters::new()).unwrap_err();
    assert_eq!(err.code(), "VQL_CLASS_TYPE_MISMATCH");
    assert_eq!(err.kind(), ErrorKind::CommandExecution);

    engine.query(&delete(true), Parameters::new()).unwrap();
    assert_eq!(count(&engine, "Person"), 0);
}

/// DELETE VERTEX also removes the edges touching the vertex.
#[test]
fn test_delete_vertex_removes_edges() {
    let engine = engine();
    let alice = rid_of(&engine, "Person", "alice");
    let bob = rid_of(&engine, "Person", "bob");
    let edge = Statement::Insert(InsertStatement {
        class: "Knows".to_string(),
        cluster: None,
        rows: vec![vec![
            SetItem::new("out", Expr::literal(alice)),
            SetItem::new("in", Expr::literal(bob)),
        ]],
        from: None,
    });
    engine.query(&edge, Parameters::new()).unwrap();
    assert_eq!(count(&engine, "Knows"), 1);

    let stmt = Statement::DeleteVertex(DeleteVertexStatement {
        target: Target::class("Person"),
        where_clause: Some(Condition::eq("name", "alice")),
        limit: None,
    });
    let rows = engine.query(&stmt, Parameters::new()).unwrap();
    assert_eq!(rows[0].property("count"), Some(&Value::Long(1)));
    assert_eq!(count(&engine, "Person"), 1);
    assert_eq!(count(&engine, "Knows"), 0);
}

/// DELETE VERTEX on a class that is not a vertex class fails.
#[test]
fn test_delete_vertex_on_plain_class_fails() {
    let engine = engine();
    let stmt = Statement::DeleteVertex(DeleteVertexStatement {
        target: Target::class("Order"),
        where_clause: None,
        limit: None,
    });
    assert!(engine.query(&stmt, Parameters::new()).is_err());
    assert_eq!(count(&engine, "Order"), 5);
}

// =============================================================================
// JSON Request Tests
// =============================================================================

/// A statement sent as JSON returns the same rows as the built statement.
#[test]
fn test_json_statement_matches_built_statement() {
    let engine = engine();
    let built = SelectStatement::from_class("Order")
        .filter(Condition::eq("customer", "cid"))
        .order_by(OrderItem::desc(Expr::field("amount")));
    let expected: Vec<serde_json::Value> = select(&engine, built.clone())
        .iter()
        .map(QueryResult::to_json)
        .collect();

    let request = serde_json::json!({
        "op": "query",
        "statement": Statement::Select(built),
    });
    let handler = RequestHandler::new(&engine);
    let response = handler.handle(&request.to_string());
    assert!(response.is_success());
    assert_eq!(response.data().unwrap().as_array().unwrap(), &expected);
}
