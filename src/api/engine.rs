//! Query engine facade
//!
//! Owns a database, its configuration and the metrics registry; plans and
//! runs statements in sessions of that database.
//!
//! `EXPLAIN` yields one row describing the plan without running it.
//! `PROFILE` runs the statement to completion and yields one row with the
//! plan and per-step row counts and timings.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::database::{Database, DatabaseSession};
use crate::error::{Error, Result};
use crate::executor::{
    EngineConfig, ExecutionContext, ExecutionPlan, ExecutionStream, Parameters, QueryResult,
    ResultSet,
};
use crate::observability::{MetricsRegistry, ObservationScope};
use crate::planner::{ExplainPlan, PlannerResult, QueryPlanner, Statement};
use crate::value::{Properties, Value};

/// Output of a `PROFILE` run
#[derive(Debug)]
pub struct Profile {
    pub rows: Vec<QueryResult>,
    pub plan: ExplainPlan,
}

pub struct QueryEngine {
    database: Database,
    config: Arc<EngineConfig>,
    metrics: Arc<MetricsRegistry>,
}

impl QueryEngine {
    /// Fails with a configuration error when `config` is out of range
    pub fn new(database: Database, config: EngineConfig) -> Result<Self> {
        config.validate().map_err(Error::configuration)?;
        Ok(Self {
            database,
            config: Arc::new(config),
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn session(&self) -> DatabaseSession {
        self.database.session()
    }

    /// Plans a statement without running it
    pub fn plan(&self, session: &DatabaseSession, stmt: &Statement) -> Result<ExecutionPlan> {
        Ok(self.plan_statement(session, stmt)?)
    }

    fn plan_statement(&self, session: &DatabaseSession, stmt: &Statement) -> PlannerResult<ExecutionPlan> {
        let scope = ObservationScope::with_fields("PLAN", &[("statement", stmt.kind())]);
        let planned = QueryPlanner::new(session, &self.config)
            .with_metrics(&self.metrics)
            .plan(stmt);
        match planned {
            Ok(plan) => {
                self.metrics.increment_queries_planned();
                let steps = plan.steps().len().to_string();
                scope.complete_with_fields(&[("steps", steps.as_str())]);
                Ok(plan)
            }
            Err(err) => {
                self.metrics.increment_queries_rejected();
                scope.fail(err.message());
                Err(err)
            }
        }
    }

    /// Runs a statement in a fresh session
    pub fn execute(&self, stmt: &Statement, params: Parameters) -> Result<ResultSet> {
        let session = self.session();
        self.execute_in(&session, stmt, params)
    }

    /// Runs a statement in `session`. Rows are produced as the result set
    /// is pulled.
    pub fn execute_in(
        &self,
        session: &DatabaseSession,
        stmt: &Statement,
        params: Parameters,
    ) -> Result<ResultSet> {
        match stmt {
            Statement::Explain { inner: statement } => {
                let plan = self.plan(session, statement)?;
                let explain = ExplainPlan::from_plan(statement.kind(), &plan);
                let ctx = self.context(session, params);
                let stream = ExecutionStream::from_rows(vec![plan_row(&explain, None)]);
                Ok(ResultSet::started(plan, ctx, stream))
            }
            Statement::Profile { inner: statement } => {
                let plan = self.plan(session, stmt)?;
                let (rows, ctx) = self.run(session, statement, &plan, params)?;
                let explain = ExplainPlan::from_plan(statement.kind(), &plan);
                let stream = ExecutionStream::from_rows(vec![plan_row(&explain, Some(rows.len()))]);
                Ok(ResultSet::started(plan, ctx, stream))
            }
            _ => {
                let plan = self.plan(session, stmt)?;
                self.metrics.increment_queries_executed();
                let mut ctx = self.context(session, params);
                if let Some(timeout) = statement_timeout(stmt) {
                    ctx.set_statement_timeout(timeout);
                }
                Ok(ResultSet::new(plan, ctx))
            }
        }
    }

    /// Runs a statement and collects every row
    pub fn query(&self, stmt: &Statement, params: Parameters) -> Result<Vec<QueryResult>> {
        let scope = ObservationScope::with_fields("EXECUTE", &[("statement", stmt.kind())]);
        let rows = self
            .execute(stmt, params)
            .and_then(|rs| rs.collect_rows().map_err(Error::from));
        match rows {
            Ok(rows) => {
                self.metrics.add_rows_returned(rows.len() as u64);
                let count = rows.len().to_string();
                scope.complete_with_fields(&[("rows", count.as_str())]);
                Ok(rows)
            }
            Err(err) => {
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    /// Describes the plan of a statement; planning failures are reported in
    /// the returned value rather than as an error
    pub fn explain(&self, stmt: &Statement) -> ExplainPlan {
        let target: &Statement = match stmt {
            Statement::Explain { inner } | Statement::Profile { inner } => inner.as_ref(),
            other => other,
        };
        match self.plan_statement(&self.session(), target) {
            Ok(plan) => ExplainPlan::from_plan(target.kind(), &plan),
            Err(err) => ExplainPlan::from_error(target.kind(), &err),
        }
    }

    /// Runs a statement with profiling on and returns its rows together with
    /// the measured plan
    pub fn profile(&self, stmt: &Statement, params: Parameters) -> Result<Profile> {
        let session = self.session();
        let profiled = Statement::Profile {
            inner: Box::new(stmt.clone()),
        };
        let plan = self.plan(&session, &profiled)?;
        let (rows, _ctx) = self.run(&session, stmt, &plan, params)?;
        Ok(Profile {
            rows,
            plan: ExplainPlan::from_plan(stmt.kind(), &plan),
        })
    }

    fn context(&self, session: &DatabaseSession, params: Parameters) -> ExecutionContext {
        ExecutionContext::new(session.clone(), Arc::clone(&self.config))
            .with_params(params)
            .with_metrics(Arc::clone(&self.metrics))
    }

    /// Drains a plan. Step counters live behind shared handles, so `plan`
    /// reports them afterwards.
    fn run(
        &self,
        session: &DatabaseSession,
        stmt: &Statement,
        plan: &ExecutionPlan,
        params: Parameters,
    ) -> Result<(Vec<QueryResult>, ExecutionContext)> {
        self.metrics.increment_queries_executed();
        let mut ctx = self.context(session, params);
        if let Some(timeout) = statement_timeout(stmt) {
            ctx.set_statement_timeout(timeout);
        }
        let mut stream = plan.start(&mut ctx)?;
        let rows = stream.collect_all(&mut ctx)?;
        stream.close(&mut ctx);
        self.metrics.add_rows_returned(rows.len() as u64);
        debug!(rows = rows.len(), statement = stmt.kind(), "profiled statement finished");
        Ok((rows, ctx))
    }
}

fn statement_timeout(stmt: &Statement) -> Option<Duration> {
    let millis = match stmt {
        Statement::Select(s) => s.timeout_ms,
        Statement::Update(u) => u.timeout_ms,
        _ => None,
    };
    millis.map(Duration::from_millis)
}

fn plan_row(explain: &ExplainPlan, rows: Option<usize>) -> QueryResult {
    let mut props = Properties::new();
    props.set("executionPlan", Value::from_json(&explain.to_json()));
    props.set("executionPlanAsString", explain.to_string());
    if let Some(rows) = rows {
        props.set("rows", rows as i64);
    }
    QueryResult::projection(props)
}
