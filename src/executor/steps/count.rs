//! Counting steps
//!
//! The `CountFrom*` steps answer a bare `count(*)` from size metadata
//! without iterating records. [`CountStep`] counts whatever its upstream
//! produces.

use crate::index::IndexDefinition;
use crate::planner::Expr;
use crate::value::{Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::ExecResult;
use crate::executor::eval::eval_expr;
use crate::executor::result::QueryResult;
use crate::executor::step::Upstream;
use crate::executor::stream::ExecutionStream;

fn count_row(alias: &str, count: u64) -> QueryResult {
    let count = i64::try_from(count).unwrap_or(i64::MAX);
    let props: Properties = [(alias, Value::Long(count))].into_iter().collect();
    QueryResult::projection(props)
}

/// `SELECT count(*) FROM Class`
#[derive(Debug, Clone, PartialEq)]
pub struct CountFromClassStep {
    pub class: String,
    pub clusters: Vec<u32>,
    pub alias: String,
}

impl CountFromClassStep {
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let count = ctx.session().storage().count_class(&self.clusters)?;
        Ok(ExecutionStream::singleton(count_row(&self.alias, count)))
    }

    pub fn details(&self) -> String {
        format!("class: {}", self.class)
    }
}

/// `SELECT count(*) FROM index:name`
#[derive(Debug, Clone, PartialEq)]
pub struct CountFromIndexStep {
    pub index: String,
    pub alias: String,
}

impl CountFromIndexStep {
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let count = ctx.session().indexes().size(&self.index)?;
        Ok(ExecutionStream::singleton(count_row(&self.alias, count)))
    }

    pub fn details(&self) -> String {
        format!("index: {}", self.index)
    }
}

/// `SELECT count(*) FROM Class WHERE field = value` over a single-field
/// index covering the whole filter
#[derive(Debug, Clone, PartialEq)]
pub struct CountFromIndexWithKeyStep {
    pub index: IndexDefinition,
    pub key: Expr,
    pub alias: String,
}

impl CountFromIndexWithKeyStep {
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let value = eval_expr(&self.key, None, ctx)?;
        let count = if value.is_null() {
            0
        } else {
            let key = self.index.convert_key_part(0, &value)?;
            ctx.session().indexes().count_key(&self.index.name, &[key])?
        };
        Ok(ExecutionStream::singleton(count_row(&self.alias, count)))
    }

    pub fn details(&self) -> String {
        format!("index: {}\nkey: {} = {}", self.index.name, self.index.fields.join(", "), self.key)
    }
}

/// Drains the upstream and emits `{alias: n}`
#[derive(Debug, Clone, PartialEq)]
pub struct CountStep {
    pub alias: String,
}

impl CountStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let mut stream = upstream.start(ctx)?;
        let mut count = 0u64;
        while stream.next_row(ctx)?.is_some() {
            count += 1;
        }
        stream.close(ctx);
        Ok(ExecutionStream::singleton(count_row(&self.alias, count)))
    }
}
