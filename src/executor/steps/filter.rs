//! Row filtering and target type gates

use crate::planner::Condition;

use crate::executor::context::ExecutionContext;
use crate::executor::errors::{ExecResult, ExecutorError};
use crate::executor::eval::matches;
use crate::executor::result::QueryResult;
use crate::executor::step::Upstream;
use crate::executor::stream::{ExecutionStream, RowProducer};

/// Keeps the rows for which the condition is true
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep {
    pub condition: Condition,
}

struct Filtered {
    upstream: ExecutionStream,
    condition: Condition,
}

impl RowProducer for Filtered {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        while let Some(row) = self.upstream.next_row(ctx)? {
            if matches(&self.condition, Some(&row), ctx)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
    }
}

impl FilterStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::from_producer(Filtered {
            upstream: upstream.start(ctx)?,
            condition: self.condition.clone(),
        }))
    }

    pub fn details(&self) -> String {
        self.condition.to_string()
    }
}

/// Fails unless `class` exists and is `parent` or one of its subclasses;
/// rows pass through unchanged
#[derive(Debug, Clone, PartialEq)]
pub struct CheckClassTypeStep {
    pub class: String,
    pub parent: String,
}

impl CheckClassTypeStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let schema = ctx.session().schema();
        if schema.get_class(&self.class)?.is_none() {
            return Err(ExecutorError::command(format!("class '{}' not found", self.class)));
        }
        if !schema.is_subclass_of(&self.class, &self.parent)? {
            return Err(ExecutorError::command(format!(
                "class '{}' is not a subclass of '{}'",
                self.class, self.parent
            )));
        }
        upstream.start(ctx)
    }

    pub fn details(&self) -> String {
        format!("{} is {}", self.class, self.parent)
    }
}

/// Fails unless every cluster belongs to `class` or one of its subclasses
#[derive(Debug, Clone, PartialEq)]
pub struct CheckClusterTypeStep {
    pub clusters: Vec<u32>,
    pub class: String,
}

impl CheckClusterTypeStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let schema = ctx.session().schema();
        for cluster in &self.clusters {
            let owner = schema.class_of_cluster(*cluster)?.ok_or_else(|| {
                ExecutorError::command(format!("cluster {} does not belong to any class", cluster))
            })?;
            if !schema.is_subclass_of(&owner.name, &self.class)? {
                return Err(ExecutorError::command(format!(
                    "cluster {} belongs to class '{}', not to '{}'",
                    cluster, owner.name, self.class
                )));
            }
        }
        upstream.start(ctx)
    }

    pub fn details(&self) -> String {
        let ids: Vec<String> = self.clusters.iter().map(u32::to_string).collect();
        format!("clusters [{}] in {}", ids.join(", "), self.class)
    }
}
