//! Caller-facing result sets

use super::context::ExecutionContext;
use super::errors::{ExecResult, ExecutorError};
use super::plan::ExecutionPlan;
use super::result::QueryResult;
use super::stream::ExecutionStream;

/// Rows of one executed statement, pulled on demand.
///
/// The plan is started on the first pull, so building a result set does
/// not touch storage. Also usable as an iterator of `ExecResult` rows;
/// iteration stops after the first error.
pub struct ResultSet {
    plan: ExecutionPlan,
    ctx: ExecutionContext,
    stream: Option<ExecutionStream>,
    closed: bool,
    failed: bool,
}

impl ResultSet {
    pub fn new(plan: ExecutionPlan, ctx: ExecutionContext) -> Self {
        Self {
            plan,
            ctx,
            stream: None,
            closed: false,
            failed: false,
        }
    }

    /// A result set whose plan has already been started
    pub(crate) fn started(plan: ExecutionPlan, ctx: ExecutionContext, stream: ExecutionStream) -> Self {
        Self {
            plan,
            ctx,
            stream: Some(stream),
            closed: false,
            failed: false,
        }
    }

    fn ensure_started(&mut self) -> ExecResult<()> {
        if self.closed {
            return Err(ExecutorError::command("result set is closed"));
        }
        if self.stream.is_none() {
            let stream = self.plan.start(&mut self.ctx)?;
            self.stream = Some(stream);
        }
        Ok(())
    }

    pub fn has_next(&mut self) -> ExecResult<bool> {
        if self.closed {
            return Ok(false);
        }
        self.ensure_started()?;
        match &mut self.stream {
            Some(stream) => stream.has_next(&mut self.ctx),
            None => Ok(false),
        }
    }

    pub fn next(&mut self) -> ExecResult<QueryResult> {
        self.ensure_started()?;
        match &mut self.stream {
            Some(stream) => stream.next(&mut self.ctx),
            None => Err(ExecutorError::no_such_element()),
        }
    }

    fn pull(&mut self) -> ExecResult<QueryResult> {
        let row = ResultSet::next(self);
        if row.is_err() {
            self.failed = true;
        }
        row
    }

    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close(&mut self.ctx);
        }
        self.closed = true;
    }

    /// The plan this result set runs, with profiling counters if enabled
    pub fn execution_plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Drains every remaining row
    pub fn collect_rows(mut self) -> ExecResult<Vec<QueryResult>> {
        let mut rows = Vec::new();
        while self.has_next()? {
            rows.push(self.next()?);
        }
        self.close();
        Ok(rows)
    }
}

impl Iterator for ResultSet {
    type Item = ExecResult<QueryResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.has_next() {
            Ok(true) => Some(self.pull()),
            Ok(false) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("plan", &self.plan.step_names())
            .field("closed", &self.closed)
            .finish()
    }
}
