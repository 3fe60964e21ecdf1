//! Logical fan-out over independent sub-plans
//!
//! Used when each branch of an OR (or each subclass of a target) is served
//! by its own index. Branches run on the caller's thread: one after the
//! other, or round-robin one row at a time.

use crate::executor::config::ParallelStrategy;
use crate::executor::context::ExecutionContext;
use crate::executor::errors::ExecResult;
use crate::executor::plan::ExecutionPlan;
use crate::executor::result::QueryResult;
use crate::executor::stream::{ExecutionStream, RowProducer};

#[derive(Debug, Clone)]
pub struct ParallelExecStep {
    pub plans: Vec<ExecutionPlan>,
    pub strategy: ParallelStrategy,
}

impl ParallelExecStep {
    pub fn start(&self) -> ExecResult<ExecutionStream> {
        let branches = self.plans.iter().cloned().map(Branch::Pending).collect();
        Ok(match self.strategy {
            ParallelStrategy::Sequential => ExecutionStream::from_producer(Sequential { branches, current: 0 }),
            ParallelStrategy::Interleaved => ExecutionStream::from_producer(Interleaved { branches, next: 0 }),
        })
    }

    pub fn details(&self) -> String {
        format!("{} branches, {}", self.plans.len(), self.strategy.as_str())
    }
}

enum Branch {
    Pending(ExecutionPlan),
    Running(ExecutionStream),
    Done,
}

impl Branch {
    /// Next row of this branch, starting it on first use
    fn pull(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        if let Branch::Pending(plan) = self {
            let stream = plan.start(ctx)?;
            *self = Branch::Running(stream);
        }
        let Branch::Running(stream) = self else {
            return Ok(None);
        };
        match stream.next_row(ctx)? {
            Some(row) => Ok(Some(row)),
            None => {
                stream.close(ctx);
                *self = Branch::Done;
                Ok(None)
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        if let Branch::Running(stream) = self {
            stream.close(ctx);
        }
        *self = Branch::Done;
    }

    fn is_done(&self) -> bool {
        matches!(self, Branch::Done)
    }
}

struct Sequential {
    branches: Vec<Branch>,
    current: usize,
}

impl RowProducer for Sequential {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        while let Some(branch) = self.branches.get_mut(self.current) {
            if let Some(row) = branch.pull(ctx)? {
                return Ok(Some(row));
            }
            self.current += 1;
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.branches.iter_mut().for_each(|b| b.close(ctx));
    }
}

struct Interleaved {
    branches: Vec<Branch>,
    next: usize,
}

impl RowProducer for Interleaved {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        while !self.branches.iter().all(Branch::is_done) {
            let index = self.next % self.branches.len();
            self.next = index + 1;
            if let Some(row) = self.branches[index].pull(ctx)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.branches.iter_mut().for_each(|b| b.close(ctx));
    }
}
