//! Pull-based result streams
//!
//! Every step produces an [`ExecutionStream`]: forward-only, single-pass,
//! driven by the caller through `has_next` / `next` with the execution
//! context passed on every call. Dropping a stream releases its cursors.

use super::context::ExecutionContext;
use super::errors::{ExecResult, ExecutorError};
use super::result::QueryResult;

/// The stream contract
pub trait ResultSource {
    /// True when another row is available; repeated calls do not advance
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<bool>;

    /// Returns the next row; fails with `NoSuchElement` when exhausted
    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<QueryResult>;

    /// Releases underlying resources; idempotent
    fn close(&mut self, _ctx: &mut ExecutionContext) {}
}

/// Simpler contract for step implementations: produce the next row or
/// `None` at the end. [`ExecutionStream::from_producer`] adds the
/// look-ahead needed for `has_next`.
pub trait RowProducer {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>>;

    fn close(&mut self, _ctx: &mut ExecutionContext) {}
}

struct Buffered<P> {
    producer: P,
    peeked: Option<QueryResult>,
    finished: bool,
}

impl<P: RowProducer> ResultSource for Buffered<P> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        if self.finished {
            return Ok(false);
        }
        match self.producer.produce(ctx)? {
            Some(row) => {
                self.peeked = Some(row);
                Ok(true)
            }
            None => {
                self.finished = true;
                self.producer.close(ctx);
                Ok(false)
            }
        }
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<QueryResult> {
        if !self.has_next(ctx)? {
            return Err(ExecutorError::no_such_element());
        }
        self.peeked.take().ok_or_else(ExecutorError::no_such_element)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.peeked = None;
        if !self.finished {
            self.finished = true;
            self.producer.close(ctx);
        }
    }
}

struct Rows(std::vec::IntoIter<QueryResult>);

impl RowProducer for Rows {
    fn produce(&mut self, _ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        Ok(self.0.next())
    }
}

struct Iter<I>(I);

impl<I> RowProducer for Iter<I>
where
    I: Iterator<Item = ExecResult<QueryResult>>,
{
    fn produce(&mut self, _ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        self.0.next().transpose()
    }
}

/// A boxed stream
pub struct ExecutionStream {
    inner: Box<dyn ResultSource>,
}

impl ExecutionStream {
    pub fn new(source: impl ResultSource + 'static) -> Self {
        Self {
            inner: Box::new(source),
        }
    }

    pub fn empty() -> Self {
        Self::from_rows(Vec::new())
    }

    pub fn singleton(row: QueryResult) -> Self {
        Self::from_rows(vec![row])
    }

    pub fn from_rows(rows: Vec<QueryResult>) -> Self {
        Self::from_producer(Rows(rows.into_iter()))
    }

    /// Wraps any produce-once sequence
    pub fn from_results<I>(iter: I) -> Self
    where
        I: Iterator<Item = ExecResult<QueryResult>> + 'static,
    {
        Self::from_producer(Iter(iter))
    }

    pub fn from_producer(producer: impl RowProducer + 'static) -> Self {
        Self::new(Buffered {
            producer,
            peeked: None,
            finished: false,
        })
    }

    pub fn has_next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<bool> {
        self.inner.has_next(ctx)
    }

    pub fn next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<QueryResult> {
        self.inner.next(ctx)
    }

    /// Pull-and-advance in one call; `None` at the end
    pub fn next_row(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        if self.inner.has_next(ctx)? {
            self.inner.next(ctx).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn close(&mut self, ctx: &mut ExecutionContext) {
        self.inner.close(ctx);
    }

    /// Drains the stream
    pub fn collect_all(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Vec<QueryResult>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row(ctx)? {
            rows.push(row);
        }
        self.close(ctx);
        Ok(rows)
    }
}

impl std::fmt::Debug for ExecutionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExecutionStream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::executor::config::EngineConfig;
    use crate::executor::errors::ExecutorErrorCode;
    use crate::value::Value;
    use std::sync::Arc;

    fn ctx() -> ExecutionContext {
        let db = Database::new("stream").unwrap();
        ExecutionContext::new(db.session(), Arc::new(EngineConfig::default()))
    }

    fn row(n: i32) -> QueryResult {
        QueryResult::projection([("n", Value::Int(n))].into_iter().collect())
    }

    #[test]
    fn test_has_next_does_not_advance() {
        let mut ctx = ctx();
        let mut stream = ExecutionStream::from_rows(vec![row(1), row(2)]);
        assert!(stream.has_next(&mut ctx).unwrap());
        assert!(stream.has_next(&mut ctx).unwrap());
        assert_eq!(stream.next(&mut ctx).unwrap(), row(1));
        assert_eq!(stream.next(&mut ctx).unwrap(), row(2));
        assert!(!stream.has_next(&mut ctx).unwrap());
    }

    #[test]
    fn test_next_on_exhausted_stream_fails() {
        let mut ctx = ctx();
        let mut stream = ExecutionStream::empty();
        let err = stream.next(&mut ctx).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::VqlNoSuchElement);
    }

    #[test]
    fn test_iterator_backed_stream_propagates_errors() {
        let mut ctx = ctx();
        let items = vec![Ok(row(1)), Err(ExecutorError::command("boom"))];
        let mut stream = ExecutionStream::from_results(items.into_iter());
        assert!(stream.next(&mut ctx).is_ok());
        assert!(stream.has_next(&mut ctx).is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut ctx = ctx();
        let mut stream = ExecutionStream::singleton(row(1));
        stream.close(&mut ctx);
        stream.close(&mut ctx);
        assert!(!stream.has_next(&mut ctx).unwrap());
    }
}
