//! Projection, LET binding and row-representation conversions

use crate::planner::{Expr, LetItem, ProjectionItem};
use crate::value::{Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::{ExecResult, ExecutorError};
use crate::executor::eval::eval_expr;
use crate::executor::result::QueryResult;
use crate::executor::step::Upstream;
use crate::executor::stream::{ExecutionStream, RowProducer};

/// Applies projection items to one row.
///
/// `*` copies every field, `!field` removes one afterwards, and
/// `field:{…}` projects the nested value (embedded, linked or a list of
/// either) with the inner items.
pub(crate) fn project_row(
    items: &[ProjectionItem],
    row: &QueryResult,
    ctx: &mut ExecutionContext,
) -> ExecResult<QueryResult> {
    let mut props = Properties::with_capacity(items.len());
    let mut excluded = Vec::new();
    for item in items {
        if item.exclude {
            if let Some(name) = item.expr.as_plain_field() {
                excluded.push(name.to_string());
            }
            continue;
        }
        if matches!(item.expr, Expr::Star) {
            for (name, value) in row.properties().iter() {
                props.set(name, value.clone());
            }
            continue;
        }
        let mut value = eval_expr(&item.expr, Some(row), ctx)?;
        if let Some(nested) = &item.nested {
            value = project_value(nested, value, ctx)?;
        }
        props.set(item.output_name(), value);
    }
    for name in &excluded {
        props.remove(name);
    }
    Ok(QueryResult::projection(props))
}

fn project_value(items: &[ProjectionItem], value: Value, ctx: &mut ExecutionContext) -> ExecResult<Value> {
    Ok(match value {
        Value::List(elements) => Value::List(
            elements
                .into_iter()
                .map(|e| project_value(items, e, ctx))
                .collect::<ExecResult<Vec<_>>>()?,
        ),
        Value::Embedded(props) => {
            let row = QueryResult::projection(props);
            Value::Embedded(project_row(items, &row, ctx)?.properties().clone())
        }
        Value::Link(rid) => match ctx.session().fetch_record(rid)? {
            Some(record) => {
                let row = QueryResult::entity(record);
                Value::Embedded(project_row(items, &row, ctx)?.properties().clone())
            }
            None => Value::Null,
        },
        other => other,
    })
}

/// Maps every upstream row through a fallible function
struct MapRows<F> {
    upstream: ExecutionStream,
    map: F,
}

impl<F> RowProducer for MapRows<F>
where
    F: FnMut(QueryResult, &mut ExecutionContext) -> ExecResult<QueryResult>,
{
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        match self.upstream.next_row(ctx)? {
            Some(row) => (self.map)(row, ctx).map(Some),
            None => Ok(None),
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
    }
}

pub(crate) fn map_rows<F>(upstream: ExecutionStream, map: F) -> ExecutionStream
where
    F: FnMut(QueryResult, &mut ExecutionContext) -> ExecResult<QueryResult> + 'static,
{
    ExecutionStream::from_producer(MapRows { upstream, map })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionStep {
    pub items: Vec<ProjectionItem>,
}

impl ProjectionStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let items = self.items.clone();
        Ok(map_rows(upstream.start(ctx)?, move |row, ctx| project_row(&items, &row, ctx)))
    }

    pub fn details(&self) -> String {
        let items: Vec<String> = self
            .items
            .iter()
            .map(|item| {
                let prefix = if item.exclude { "!" } else { "" };
                match &item.alias {
                    Some(alias) => format!("{}{} AS {}", prefix, item.expr, alias),
                    None => format!("{}{}", prefix, item.expr),
                }
            })
            .collect();
        items.join(", ")
    }
}

/// Per-row LET: each value is stored on the row and visible to later
/// items and steps as `$name`
#[derive(Debug, Clone, PartialEq)]
pub struct LetStep {
    pub items: Vec<LetItem>,
}

impl LetStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let items = self.items.clone();
        Ok(map_rows(upstream.start(ctx)?, move |mut row, ctx| {
            for item in &items {
                let value = eval_expr(&item.expr, Some(&row), ctx)?;
                row.set_metadata(item.name.trim_start_matches('$').to_ascii_lowercase(), value);
            }
            Ok(row)
        }))
    }

    pub fn details(&self) -> String {
        render_let(&self.items)
    }
}

/// LET items that do not depend on the row, computed once before the
/// upstream starts
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalLetStep {
    pub items: Vec<LetItem>,
}

impl GlobalLetStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        for item in &self.items {
            let value = eval_expr(&item.expr, None, ctx)?;
            ctx.set_variable(item.name.trim_start_matches('$'), value);
        }
        upstream.start(ctx)
    }

    pub fn details(&self) -> String {
        render_let(&self.items)
    }
}

fn render_let(items: &[LetItem]) -> String {
    items
        .iter()
        .map(|item| format!("${} = {}", item.name.trim_start_matches('$'), item.expr))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalizes every row to the internal representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertToResultInternalStep;

impl ConvertToResultInternalStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(map_rows(upstream.start(ctx)?, |row, _ctx| {
            Ok(QueryResult::Internal(row.into_internal()))
        }))
    }
}

/// Wraps record-backed rows so that writes go through to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertToUpdatableResultStep;

impl ConvertToUpdatableResultStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(map_rows(upstream.start(ctx)?, |row, ctx| match row {
            QueryResult::Entity(entity) => Ok(QueryResult::updatable(
                entity.record().clone(),
                ctx.session().clone(),
            )),
            updatable @ QueryResult::Updatable(_) => Ok(updatable),
            other => match other.identity() {
                Some(rid) => {
                    let record = ctx.session().fetch_record(rid)?.ok_or_else(|| {
                        ExecutorError::command(format!("record {} not found", rid))
                    })?;
                    Ok(QueryResult::updatable(record, ctx.session().clone()))
                }
                None => Err(ExecutorError::command(format!(
                    "row {} is not backed by a record and cannot be modified",
                    other
                ))),
            },
        }))
    }
}
