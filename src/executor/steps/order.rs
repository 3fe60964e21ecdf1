//! ORDER BY

use crate::planner::{Expr, OrderItem};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::ExecResult;
use crate::executor::sorter::ResultSorter;
use crate::executor::step::Upstream;
use crate::executor::stream::ExecutionStream;

use super::structural::eval_count;

/// Sorts the upstream in memory.
///
/// When the statement has a LIMIT the step only retains the first
/// `skip + limit` rows; the SKIP and LIMIT steps still follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByStep {
    pub items: Vec<OrderItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl OrderByStep {
    fn bound(&self, ctx: &mut ExecutionContext) -> ExecResult<Option<usize>> {
        let Some(limit) = &self.limit else {
            return Ok(None);
        };
        let limit = eval_count(limit, "LIMIT", ctx)?;
        let skip = match &self.skip {
            Some(skip) => eval_count(skip, "SKIP", ctx)?,
            None => 0,
        };
        Ok(Some(skip.saturating_add(limit)))
    }

    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let bound = self.bound(ctx)?;
        let max = ctx.config().max_heap_elements_per_operation;
        let mut sorter = ResultSorter::new(self.items.clone(), bound, max);
        ctx.metrics().increment_sorts();

        let mut stream = upstream.start(ctx)?;
        while let Some(row) = stream.next_row(ctx)? {
            sorter.push(row, ctx)?;
        }
        stream.close(ctx);
        Ok(ExecutionStream::from_rows(sorter.finish()))
    }

    pub fn details(&self) -> String {
        let items: Vec<String> = self
            .items
            .iter()
            .map(|o| format!("{} {}", o.expr, o.effective_direction().as_str()))
            .collect();
        items.join(", ")
    }
}
