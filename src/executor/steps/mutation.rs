//! INSERT, UPDATE and DELETE
//!
//! Writes run inside the session's transaction. UPDATE and DELETE consume
//! the rows of a normal query pipeline; the planner puts a count step
//! after them so the statement reports how many records it touched.

use tracing::debug;

use crate::planner::SetItem;
use crate::storage::{RecordId, ScanDirection};
use crate::value::{Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::{ExecResult, ExecutorError};
use crate::executor::eval::eval_expr;
use crate::executor::result::QueryResult;
use crate::executor::step::Upstream;
use crate::executor::stream::{ExecutionStream, RowProducer};

use super::projection::map_rows;

/// Where the field values of new records come from
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// One list of assignments per record
    Values(Vec<Vec<SetItem>>),
    /// Every upstream row becomes a record with the same fields
    Upstream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStep {
    pub class: String,
    pub cluster: Option<u32>,
    pub source: InsertSource,
}

impl InsertStep {
    fn create(&self, properties: Properties, ctx: &mut ExecutionContext) -> ExecResult<QueryResult> {
        let record = ctx.session().create_record(&self.class, self.cluster, properties)?;
        debug!(rid = %record.rid, class = %self.class, "inserted");
        Ok(QueryResult::entity(record))
    }

    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        match &self.source {
            InsertSource::Values(rows) => {
                let mut created = Vec::with_capacity(rows.len());
                for items in rows {
                    let mut properties = Properties::with_capacity(items.len());
                    for item in items {
                        let value = eval_expr(&item.expr, None, ctx)?;
                        properties.set(item.field.as_str(), value);
                    }
                    created.push(self.create(properties, ctx)?);
                }
                Ok(ExecutionStream::from_rows(created))
            }
            InsertSource::Upstream => {
                let step = self.clone();
                Ok(map_rows(upstream.start(ctx)?, move |row, ctx| {
                    step.create(row.properties().clone(), ctx)
                }))
            }
        }
    }

    pub fn details(&self) -> String {
        match self.cluster {
            Some(cluster) => format!("into {} cluster {}", self.class, cluster),
            None => format!("into {}", self.class),
        }
    }
}

/// Applies `SET` and `REMOVE` to every upstream row
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStep {
    pub set: Vec<SetItem>,
    pub remove: Vec<String>,
}

impl UpdateStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let set = self.set.clone();
        let remove = self.remove.clone();
        Ok(map_rows(upstream.start(ctx)?, move |row, ctx| {
            let mut updatable = match row {
                QueryResult::Updatable(updatable) => updatable,
                other => return Err(ExecutorError::command(format!("row {} cannot be updated", other))),
            };
            let current = QueryResult::entity(updatable.record().clone());
            let mut changes = Vec::with_capacity(set.len());
            for item in &set {
                changes.push((item.field.clone(), eval_expr(&item.expr, Some(&current), ctx)?));
            }
            updatable.apply(changes, &remove)?;
            Ok(QueryResult::entity(updatable.record().clone()))
        }))
    }

    pub fn details(&self) -> String {
        let mut parts: Vec<String> = self.set.iter().map(|s| format!("{} = {}", s.field, s.expr)).collect();
        if !self.remove.is_empty() {
            parts.push(format!("REMOVE {}", self.remove.join(", ")));
        }
        parts.join(", ")
    }
}

/// Deletes every upstream record. With `delete_edges` the edges whose
/// `out` or `in` points at a deleted vertex go too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteStep {
    pub delete_edges: bool,
}

struct Delete {
    upstream: ExecutionStream,
    delete_edges: bool,
}

fn linked_edges(rid: RecordId, ctx: &ExecutionContext) -> ExecResult<Vec<RecordId>> {
    let session = ctx.session();
    if session.schema().get_class("E")?.is_none() {
        return Ok(Vec::new());
    }
    let mut edges = Vec::new();
    for cluster in session.schema().polymorphic_cluster_ids("E")? {
        for record in session.storage().scan_cluster(cluster, ScanDirection::Ascending)? {
            let record = record?;
            let touches = ["out", "in"]
                .iter()
                .any(|end| record.properties.get(end) == Some(&Value::Link(rid)));
            if touches {
                edges.push(record.rid);
            }
        }
    }
    Ok(edges)
}

impl RowProducer for Delete {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        while let Some(row) = self.upstream.next_row(ctx)? {
            let Some(rid) = row.identity() else {
                return Err(ExecutorError::command(format!("row {} is not a record", row)));
            };
            if self.delete_edges {
                for edge in linked_edges(rid, ctx)? {
                    ctx.session().delete_record(edge)?;
                }
            }
            if ctx.session().delete_record(rid)? {
                debug!(rid = %rid, "deleted");
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
    }
}

impl DeleteStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::from_producer(Delete {
            upstream: upstream.start(ctx)?,
            delete_edges: self.delete_edges,
        }))
    }

    pub fn details(&self) -> Option<String> {
        self.delete_edges.then(|| "with connected edges".to_string())
    }
}

/// Removes the `{key, rid}` entries coming from upstream from an index.
/// The records behind them are left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteFromIndexStep {
    pub index: String,
    /// Number of key fields; composite keys arrive as a list
    pub key_width: usize,
}

struct DeleteEntries {
    upstream: ExecutionStream,
    index: String,
    key_width: usize,
}

impl RowProducer for DeleteEntries {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        let Some(entry) = self.upstream.next_row(ctx)? else {
            return Ok(None);
        };
        let rid = entry
            .property("rid")
            .and_then(Value::as_link)
            .ok_or_else(|| ExecutorError::command("index entry row without a 'rid' link"))?;
        let key = entry.property("key").cloned().unwrap_or(Value::Null);
        let parts = match key {
            Value::List(parts) if self.key_width > 1 => parts,
            single => vec![single],
        };
        ctx.session().indexes().remove(&self.index, &parts, rid)?;
        debug!(index = %self.index, rid = %rid, "index entry removed");
        Ok(Some(entry))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
    }
}

impl DeleteFromIndexStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::from_producer(DeleteEntries {
            upstream: upstream.start(ctx)?,
            index: self.index.clone(),
            key_width: self.key_width,
        }))
    }

    pub fn details(&self) -> String {
        format!("index: {}", self.index)
    }
}
