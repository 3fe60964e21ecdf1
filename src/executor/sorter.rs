//! In-memory sorting for ORDER BY
//!
//! Rows are keyed once on arrival. With a LIMIT the sorter keeps only the
//! best `skip + limit` rows in a bounded heap; without one it materializes
//! everything up to the configured element cap and fails past it.
//!
//! Equal keys keep their arrival order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::planner::{OrderDirection, OrderItem};
use crate::value::Value;

use super::context::ExecutionContext;
use super::errors::{ExecResult, ExecutorError};
use super::eval::eval_expr;
use super::result::QueryResult;

/// Evaluated sort key of one row
#[derive(Debug, Clone)]
pub struct SortKey(Vec<(Value, OrderDirection)>);

impl SortKey {
    pub fn new(parts: Vec<(Value, OrderDirection)>) -> Self {
        Self(parts)
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for ((a, direction), (b, _)) in self.0.iter().zip(other.0.iter()) {
            let ord = match direction {
                OrderDirection::Asc => a.total_cmp(b),
                OrderDirection::Desc => b.total_cmp(a),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

#[derive(Debug)]
struct SortEntry {
    key: SortKey,
    seq: u64,
    row: QueryResult,
}

impl PartialEq for SortEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortEntry {}

impl PartialOrd for SortEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.seq.cmp(&other.seq))
    }
}

enum Buffer {
    /// Max-heap holding the best `bound` rows; the root is the worst kept
    Bounded { heap: BinaryHeap<SortEntry>, bound: usize },
    Unbounded(Vec<SortEntry>),
}

/// Accumulates rows and returns them ordered
pub struct ResultSorter {
    items: Vec<OrderItem>,
    buffer: Buffer,
    max_elements: usize,
    seq: u64,
}

impl ResultSorter {
    /// `bound` is the number of rows the caller will read (skip + limit)
    pub fn new(items: Vec<OrderItem>, bound: Option<usize>, max_elements: usize) -> Self {
        let buffer = match bound {
            Some(bound) if bound <= max_elements => Buffer::Bounded {
                heap: BinaryHeap::with_capacity(bound.saturating_add(1).min(1024)),
                bound,
            },
            _ => Buffer::Unbounded(Vec::new()),
        };
        Self {
            items,
            buffer,
            max_elements,
            seq: 0,
        }
    }

    pub fn sort_key(&self, row: &QueryResult, ctx: &mut ExecutionContext) -> ExecResult<SortKey> {
        let mut parts = Vec::with_capacity(self.items.len());
        for item in &self.items {
            parts.push((eval_expr(&item.expr, Some(row), ctx)?, item.effective_direction()));
        }
        Ok(SortKey::new(parts))
    }

    pub fn push(&mut self, row: QueryResult, ctx: &mut ExecutionContext) -> ExecResult<()> {
        let key = self.sort_key(&row, ctx)?;
        let entry = SortEntry {
            key,
            seq: self.seq,
            row,
        };
        self.seq += 1;
        match &mut self.buffer {
            Buffer::Bounded { heap, bound } => {
                if *bound == 0 {
                    return Ok(());
                }
                heap.push(entry);
                if heap.len() > *bound {
                    heap.pop();
                }
            }
            Buffer::Unbounded(rows) => {
                if rows.len() >= self.max_elements {
                    return Err(ExecutorError::resource_limit(format!(
                        "ORDER BY exceeded {} in-memory elements",
                        self.max_elements
                    )));
                }
                rows.push(entry);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match &self.buffer {
            Buffer::Bounded { heap, .. } => heap.len(),
            Buffer::Unbounded(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows in sort order
    pub fn finish(self) -> Vec<QueryResult> {
        let entries = match self.buffer {
            Buffer::Bounded { heap, .. } => heap.into_sorted_vec(),
            Buffer::Unbounded(mut rows) => {
                rows.sort();
                rows
            }
        };
        entries.into_iter().map(|e| e.row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::executor::config::EngineConfig;
    use crate::executor::errors::ExecutorErrorCode;
    use crate::planner::Expr;
    use std::sync::Arc;

    fn ctx() -> ExecutionContext {
        let db = Database::new("sorter").unwrap();
        ExecutionContext::new(db.session(), Arc::new(EngineConfig::default()))
    }

    fn row(name: &str, n: i32) -> QueryResult {
        QueryResult::projection([("name", Value::from(name)), ("n", Value::Int(n))].into_iter().collect())
    }

    fn names(rows: &[QueryResult]) -> Vec<String> {
        rows.iter()
            .map(|r| r.property("name").and_then(Value::as_str).unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_full_sort_is_stable() {
        let mut ctx = ctx();
        let mut sorter = ResultSorter::new(vec![OrderItem::desc(Expr::field("n"))], None, 100);
        for (name, n) in [("a", 1), ("b", 2), ("c", 1), ("d", 2)] {
            sorter.push(row(name, n), &mut ctx).unwrap();
        }
        assert_eq!(names(&sorter.finish()), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_bounded_heap_keeps_best_rows() {
        let mut ctx = ctx();
        let mut sorter = ResultSorter::new(vec![OrderItem::asc(Expr::field("n"))], Some(2), 100);
        for (name, n) in [("a", 5), ("b", 1), ("c", 4), ("d", 2), ("e", 1)] {
            sorter.push(row(name, n), &mut ctx).unwrap();
        }
        assert_eq!(sorter.len(), 2);
        assert_eq!(names(&sorter.finish()), vec!["b", "e"]);
    }

    #[test]
    fn test_element_cap() {
        let mut ctx = ctx();
        let mut sorter = ResultSorter::new(vec![OrderItem::asc(Expr::field("n"))], None, 2);
        sorter.push(row("a", 1), &mut ctx).unwrap();
        sorter.push(row("b", 2), &mut ctx).unwrap();
        let err = sorter.push(row("c", 3), &mut ctx).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::VqlResourceLimit);
    }

    #[test]
    fn test_bound_above_cap_falls_back_to_capped_buffer() {
        let mut ctx = ctx();
        let mut sorter = ResultSorter::new(vec![OrderItem::asc(Expr::field("n"))], Some(10), 1);
        sorter.push(row("a", 1), &mut ctx).unwrap();
        assert!(sorter.push(row("b", 2), &mut ctx).is_err());
    }

    #[test]
    fn test_zero_bound_keeps_nothing() {
        let mut ctx = ctx();
        let mut sorter = ResultSorter::new(vec![OrderItem::asc(Expr::field("n"))], Some(0), 10);
        sorter.push(row("a", 1), &mut ctx).unwrap();
        assert!(sorter.is_empty());
    }
}
