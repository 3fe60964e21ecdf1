//! DISTINCT, SKIP, LIMIT, UNWIND and the no-target row generator

use std::collections::BTreeSet;

use crate::planner::Expr;
use crate::storage::RecordId;
use crate::value::{OrdValue, Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::{ExecResult, ExecutorError};
use crate::executor::eval::eval_expr;
use crate::executor::result::QueryResult;
use crate::executor::step::Upstream;
use crate::executor::stream::{ExecutionStream, RowProducer};

/// Evaluates a SKIP or LIMIT expression; negative values are rejected
pub(crate) fn eval_count(expr: &Expr, clause: &str, ctx: &mut ExecutionContext) -> ExecResult<usize> {
    let value = eval_expr(expr, None, ctx)?;
    let n = value.as_i64().ok_or_else(|| {
        ExecutorError::type_conversion(format!("{} expects an integer, got {}", clause, value))
    })?;
    usize::try_from(n).map_err(|_| ExecutorError::command(format!("{} must not be negative, got {}", clause, n)))
}

/// One row with no fields, the source of a SELECT without FROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyDataGeneratorStep;

impl EmptyDataGeneratorStep {
    pub fn start(&self) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::singleton(QueryResult::projection(Properties::new())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum DistinctKey {
    Record(RecordId),
    Row(Vec<(String, OrdValue)>),
}

fn distinct_key(row: &QueryResult) -> DistinctKey {
    match row.identity() {
        Some(rid) if row.is_entity() => DistinctKey::Record(rid),
        _ => DistinctKey::Row(
            row.properties()
                .iter()
                .map(|(name, value)| (name.to_string(), OrdValue(value.clone())))
                .collect(),
        ),
    }
}

/// Drops rows equal to an earlier one, keeping first occurrences in order.
///
/// Record-backed rows compare by identity, synthesized rows by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistinctStep;

struct Distinct {
    upstream: ExecutionStream,
    seen: BTreeSet<DistinctKey>,
    max: usize,
}

impl RowProducer for Distinct {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        while let Some(row) = self.upstream.next_row(ctx)? {
            let key = distinct_key(&row);
            if self.seen.contains(&key) {
                continue;
            }
            if self.seen.len() >= self.max {
                return Err(ExecutorError::resource_limit(format!(
                    "DISTINCT exceeded {} in-memory elements",
                    self.max
                )));
            }
            self.seen.insert(key);
            return Ok(Some(row));
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
        self.seen.clear();
    }
}

impl DistinctStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::from_producer(Distinct {
            upstream: upstream.start(ctx)?,
            seen: BTreeSet::new(),
            max: ctx.config().max_heap_elements_per_operation,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkipStep {
    pub expr: Expr,
}

struct Skip {
    upstream: ExecutionStream,
    remaining: usize,
}

impl RowProducer for Skip {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        while self.remaining > 0 {
            if self.upstream.next_row(ctx)?.is_none() {
                self.remaining = 0;
                return Ok(None);
            }
            self.remaining -= 1;
        }
        self.upstream.next_row(ctx)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
    }
}

impl SkipStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let remaining = eval_count(&self.expr, "SKIP", ctx)?;
        Ok(ExecutionStream::from_producer(Skip {
            upstream: upstream.start(ctx)?,
            remaining,
        }))
    }

    pub fn details(&self) -> String {
        self.expr.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitStep {
    pub expr: Expr,
}

struct Limit {
    upstream: ExecutionStream,
    remaining: usize,
}

impl RowProducer for Limit {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.upstream.next_row(ctx)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
    }
}

impl LimitStep {
    /// `LIMIT 0` returns an empty stream without starting the upstream
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let remaining = eval_count(&self.expr, "LIMIT", ctx)?;
        if remaining == 0 {
            return Ok(ExecutionStream::empty());
        }
        Ok(ExecutionStream::from_producer(Limit {
            upstream: upstream.start(ctx)?,
            remaining,
        }))
    }

    pub fn details(&self) -> String {
        self.expr.to_string()
    }
}

/// Flat-maps collection fields: one output row per element, cartesian
/// across several fields. Non-collection values pass through; an empty
/// collection yields one row with the field set to null.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindStep {
    pub fields: Vec<String>,
}

fn unwind_row(row: QueryResult, fields: &[String]) -> Vec<QueryResult> {
    let Some((field, rest)) = fields.split_first() else {
        return vec![row];
    };
    let items = match row.property(field) {
        Some(Value::List(items)) => items.clone(),
        _ => return unwind_row(row, rest),
    };
    let base = row.into_internal();
    let expanded: Vec<Value> = if items.is_empty() { vec![Value::Null] } else { items };
    expanded
        .into_iter()
        .flat_map(|item| {
            let mut copy = base.clone();
            copy.set_property(field.as_str(), item);
            unwind_row(QueryResult::Projection(copy), rest)
        })
        .collect()
}

struct Unwind {
    upstream: ExecutionStream,
    fields: Vec<String>,
    pending: std::collections::VecDeque<QueryResult>,
}

impl RowProducer for Unwind {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            match self.upstream.next_row(ctx)? {
                Some(row) => self.pending.extend(unwind_row(row, &self.fields)),
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
        self.pending.clear();
    }
}

impl UnwindStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::from_producer(Unwind {
            upstream: upstream.start(ctx)?,
            fields: self.fields.clone(),
            pending: Default::default(),
        }))
    }

    pub fn details(&self) -> String {
        self.fields.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwind_cartesian() {
        let row = QueryResult::projection(
            [
                ("a", Value::List(vec![Value::Int(1), Value::Int(2)])),
                ("b", Value::List(vec![Value::from("x"), Value::from("y")])),
                ("c", Value::Int(7)),
            ]
            .into_iter()
            .collect(),
        );
        let rows = unwind_row(row, &["a".to_string(), "b".to_string()]);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].property("a"), Some(&Value::Int(1)));
        assert_eq!(rows[1].property("b"), Some(&Value::from("y")));
        assert!(rows.iter().all(|r| r.property("c") == Some(&Value::Int(7))));
    }

    #[test]
    fn test_unwind_scalar_and_empty() {
        let scalar = QueryResult::projection([("a", Value::Int(1))].into_iter().collect());
        assert_eq!(unwind_row(scalar, &["a".to_string()]).len(), 1);

        let empty = QueryResult::projection([("a", Value::List(Vec::new()))].into_iter().collect());
        let rows = unwind_row(empty, &["a".to_string()]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].property("a"), Some(&Value::Null));
    }

    #[test]
    fn test_distinct_key_compares_numbers_by_value() {
        let a = QueryResult::projection([("n", Value::Int(1))].into_iter().collect());
        let b = QueryResult::projection([("n", Value::Long(1))].into_iter().collect());
        assert_eq!(distinct_key(&a), distinct_key(&b));
    }
}
