//! Source steps reading records from storage, variables and subqueries

use std::collections::VecDeque;

use crate::storage::{RecordCursor, RecordId, ScanDirection};
use crate::value::Value;

use crate::executor::context::{ExecutionContext, ScopeId};
use crate::executor::errors::ExecResult;
use crate::executor::plan::ExecutionPlan;
use crate::executor::result::QueryResult;
use crate::executor::stream::{ExecutionStream, RowProducer};

/// Walks clusters one after the other, yielding entity rows
struct ClusterScan {
    clusters: VecDeque<u32>,
    direction: ScanDirection,
    cursor: Option<RecordCursor>,
}

impl ClusterScan {
    fn new(clusters: &[u32], direction: ScanDirection) -> Self {
        let mut ordered = clusters.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        if direction == ScanDirection::Descending {
            ordered.reverse();
        }
        Self {
            clusters: ordered.into(),
            direction,
            cursor: None,
        }
    }
}

impl RowProducer for ClusterScan {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        loop {
            if let Some(cursor) = self.cursor.as_mut() {
                match cursor.next() {
                    Some(record) => return Ok(Some(QueryResult::entity(record?))),
                    None => self.cursor = None,
                }
            }
            let Some(cluster) = self.clusters.pop_front() else {
                return Ok(None);
            };
            self.cursor = Some(ctx.session().storage().scan_cluster(cluster, self.direction)?);
        }
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) {
        self.cursor = None;
        self.clusters.clear();
    }
}

/// Full scan of a class: every cluster backing it (and its subclasses when
/// polymorphic), in cluster-id order
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFromClassStep {
    pub class: String,
    pub clusters: Vec<u32>,
    pub direction: ScanDirection,
}

impl FetchFromClassStep {
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        ctx.metrics().increment_full_scans();
        Ok(ExecutionStream::from_producer(ClusterScan::new(&self.clusters, self.direction)))
    }

    pub fn details(&self) -> String {
        let clusters: Vec<String> = self.clusters.iter().map(u32::to_string).collect();
        format!(
            "class: {}, clusters: [{}]{}",
            self.class,
            clusters.join(", "),
            descending_note(self.direction)
        )
    }
}

/// Scan of explicitly named clusters
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFromClustersStep {
    pub clusters: Vec<u32>,
    pub direction: ScanDirection,
}

impl FetchFromClustersStep {
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        ctx.metrics().increment_full_scans();
        Ok(ExecutionStream::from_producer(ClusterScan::new(&self.clusters, self.direction)))
    }

    pub fn details(&self) -> String {
        let clusters: Vec<String> = self.clusters.iter().map(u32::to_string).collect();
        format!("clusters: [{}]{}", clusters.join(", "), descending_note(self.direction))
    }
}

fn descending_note(direction: ScanDirection) -> &'static str {
    match direction {
        ScanDirection::Ascending => "",
        ScanDirection::Descending => " (descending)",
    }
}

struct RidFetch {
    rids: std::vec::IntoIter<RecordId>,
}

impl RowProducer for RidFetch {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        for rid in self.rids.by_ref() {
            if let Some(record) = ctx.session().fetch_record(rid)? {
                return Ok(Some(QueryResult::entity(record)));
            }
        }
        Ok(None)
    }
}

/// Loads an explicit list of records in list order; missing ones are skipped
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFromRidsStep {
    pub rids: Vec<RecordId>,
}

impl FetchFromRidsStep {
    pub fn start(&self) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::from_producer(RidFetch {
            rids: self.rids.clone().into_iter(),
        }))
    }

    pub fn details(&self) -> String {
        let rids: Vec<String> = self.rids.iter().map(RecordId::to_string).collect();
        format!("rids: [{}]", rids.join(", "))
    }
}

/// Turns a value into a row: links load their record, embedded values
/// become projections, anything else `{value: v}`
pub(crate) fn value_to_row(value: Value, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
    Ok(match value {
        Value::Null => None,
        Value::Link(rid) => ctx.session().fetch_record(rid)?.map(QueryResult::entity),
        Value::Embedded(props) => Some(QueryResult::projection(props)),
        Value::Map(entries) => Some(QueryResult::projection(entries.into_iter().collect())),
        other => Some(QueryResult::projection([("value", other)].into_iter().collect())),
    })
}

/// Rows from a `$variable` bound by a global LET
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFromVariableStep {
    pub name: String,
}

impl FetchFromVariableStep {
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let value = ctx.variable(&self.name).cloned().unwrap_or(Value::Null);
        let mut rows = Vec::new();
        for element in value.into_elements() {
            if let Some(row) = value_to_row(element, ctx)? {
                rows.push(row);
            }
        }
        Ok(ExecutionStream::from_rows(rows))
    }

    pub fn details(&self) -> String {
        format!("${}", self.name)
    }
}

/// Runs a nested SELECT in a child scope and streams its rows
#[derive(Debug, Clone)]
pub struct FetchFromSubqueryStep {
    pub plan: ExecutionPlan,
}

impl FetchFromSubqueryStep {
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let previous = ctx.enter_child();
        let scope = ctx.active_scope();
        let started = self.plan.start(ctx);
        ctx.resume_scope(previous);
        match started {
            Ok(stream) => Ok(ExecutionStream::from_producer(SubqueryRows {
                scope,
                stream,
                released: false,
            })),
            Err(err) => {
                ctx.release_scope(scope);
                Err(err)
            }
        }
    }
}

/// Inner stream of a subquery target. The child scope stays alive between
/// pulls and is active only while the inner plan runs.
struct SubqueryRows {
    scope: ScopeId,
    stream: ExecutionStream,
    released: bool,
}

impl SubqueryRows {
    fn in_scope<T>(
        &mut self,
        ctx: &mut ExecutionContext,
        f: impl FnOnce(&mut ExecutionStream, &mut ExecutionContext) -> T,
    ) -> T {
        let previous = ctx.resume_scope(self.scope);
        let out = f(&mut self.stream, ctx);
        ctx.resume_scope(previous);
        out
    }
}

impl RowProducer for SubqueryRows {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        self.in_scope(ctx, |stream, ctx| stream.next_row(ctx))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        if self.released {
            return;
        }
        self.released = true;
        self.in_scope(ctx, |stream, ctx| stream.close(ctx));
        ctx.release_scope(self.scope);
    }
}
