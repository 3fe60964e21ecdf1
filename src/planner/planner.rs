//! Statement planner
//!
//! Entry point turning any [`Statement`] into an [`ExecutionPlan`].
//! Planning reads the catalog but never records: the same statement over
//! the same catalog always produces the same plan.

use crate::database::DatabaseSession;
use crate::executor::{EngineConfig, ExecutionPlan};
use crate::observability::MetricsRegistry;

use super::ast::Statement;
use super::commands::CommandPlanner;
use super::errors::PlannerResult;
use super::mutation::MutationPlanner;
use super::select::SelectPlanner;

pub struct QueryPlanner<'a> {
    session: &'a DatabaseSession,
    config: &'a EngineConfig,
    metrics: Option<&'a MetricsRegistry>,
    profiling: bool,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(session: &'a DatabaseSession, config: &'a EngineConfig) -> Self {
        Self {
            session,
            config,
            metrics: None,
            profiling: config.profiling,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Overrides the configured profiling flag
    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    fn select_planner(&self) -> SelectPlanner<'a> {
        let planner = SelectPlanner::new(self.session, self.config).with_profiling(self.profiling);
        match self.metrics {
            Some(metrics) => planner.with_metrics(metrics),
            None => planner,
        }
    }

    fn mutation_planner(&self) -> MutationPlanner<'a> {
        MutationPlanner::new(self.session, self.select_planner(), self.profiling)
    }

    /// Plans a statement. `EXPLAIN` and `PROFILE` plan the statement they
    /// wrap; `PROFILE` turns profiling on.
    pub fn plan(&self, stmt: &Statement) -> PlannerResult<ExecutionPlan> {
        match stmt {
            Statement::Select(select) => self.select_planner().plan(select),
            Statement::Insert(insert) => self.mutation_planner().plan_insert(insert),
            Statement::Update(update) => self.mutation_planner().plan_update(update),
            Statement::Delete(delete) => self.mutation_planner().plan_delete(delete),
            Statement::DeleteVertex(delete) => self.mutation_planner().plan_delete_vertex(delete),
            Statement::Explain { inner: statement } => self.plan(statement),
            Statement::Profile { inner: statement } => QueryPlanner {
                profiling: true,
                ..*self
            }
            .plan(statement),
            ddl => CommandPlanner::new(self.profiling).plan(ddl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::planner::ast::{SelectStatement, Target};

    fn session() -> DatabaseSession {
        let db = Database::new("test").unwrap();
        let session = db.session();
        session.create_class("Person", Vec::new(), false).unwrap();
        session
    }

    #[test]
    fn test_deterministic_planning() {
        let session = session();
        let config = EngineConfig::default();
        let planner = QueryPlanner::new(&session, &config);
        let stmt = Statement::Select(SelectStatement::from_class("Person").limit(3));
        let first = planner.plan(&stmt).unwrap();
        let second = planner.plan(&stmt).unwrap();
        assert_eq!(first.pretty_print(0), second.pretty_print(0));
    }

    #[test]
    fn test_profile_enables_profiling() {
        let session = session();
        let config = EngineConfig::default();
        let planner = QueryPlanner::new(&session, &config);
        let inner = Statement::Select(SelectStatement::from_class("Person"));
        let plan = planner
            .plan(&Statement::Profile {
                inner: Box::new(inner.clone()),
            })
            .unwrap();
        assert!(plan.is_profiling());
        assert!(!planner.plan(&inner).unwrap().is_profiling());
    }

    #[test]
    fn test_unknown_class_rejected() {
        let session = session();
        let config = EngineConfig::default();
        let stmt = Statement::Select(SelectStatement::from_target(Target::class("Nope")));
        let err = QueryPlanner::new(&session, &config).plan(&stmt).unwrap_err();
        assert_eq!(err.code(), crate::planner::PlannerErrorCode::VqlUnknownClass);
    }
}
