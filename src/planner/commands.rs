//! Planning of schema and administration commands
//!
//! A command plan is a single terminal step. Existence checks happen when
//! the step runs, against the catalog as it is at that moment.

use crate::executor::steps::{CommandStep, DdlCommand, StepKind};
use crate::executor::ExecutionPlan;

use super::ast::Statement;
use super::errors::{PlannerError, PlannerResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPlanner {
    profiling: bool,
}

impl CommandPlanner {
    pub fn new(profiling: bool) -> Self {
        Self { profiling }
    }

    pub fn plan(&self, stmt: &Statement) -> PlannerResult<ExecutionPlan> {
        let command = to_command(stmt)?;
        let mut plan = ExecutionPlan::new(self.profiling);
        plan.chain(StepKind::Command(CommandStep::new(command)));
        Ok(plan)
    }
}

fn to_command(stmt: &Statement) -> PlannerResult<DdlCommand> {
    Ok(match stmt {
        Statement::CreateClass(c) => {
            if c.name.trim().is_empty() {
                return Err(PlannerError::query_invalid("class name cannot be empty"));
            }
            DdlCommand::CreateClass(c.clone())
        }
        Statement::DropClass(c) => DdlCommand::DropClass(c.clone()),
        Statement::CreateProperty(c) => DdlCommand::CreateProperty(c.clone()),
        Statement::DropProperty(c) => DdlCommand::DropProperty(c.clone()),
        Statement::CreateCluster(c) => DdlCommand::CreateCluster(c.clone()),
        Statement::DropCluster(c) => DdlCommand::DropCluster(c.clone()),
        Statement::CreateIndex(c) => {
            if c.fields.is_empty() {
                return Err(PlannerError::query_invalid(format!(
                    "index '{}' needs at least one field",
                    c.name
                )));
            }
            if c.by.is_some() && c.fields.len() != 1 {
                return Err(PlannerError::query_invalid(
                    "BY KEY / BY VALUE indexes take exactly one field",
                ));
            }
            DdlCommand::CreateIndex(c.clone())
        }
        Statement::DropIndex(c) => DdlCommand::DropIndex(c.clone()),
        Statement::CreateSequence(c) => {
            if c.increment == Some(0) {
                return Err(PlannerError::query_invalid("sequence increment cannot be 0"));
            }
            DdlCommand::CreateSequence(c.clone())
        }
        Statement::DropSequence(c) => DdlCommand::DropSequence(c.clone()),
        Statement::CreateUser(c) => DdlCommand::CreateUser(c.clone()),
        Statement::DropUser(c) => DdlCommand::DropUser(c.clone()),
        Statement::CreateSecurityPolicy(c) => DdlCommand::CreateSecurityPolicy(c.clone()),
        Statement::DropSecurityPolicy(c) => DdlCommand::DropSecurityPolicy(c.clone()),
        Statement::Sleep(c) => DdlCommand::Sleep(c.clone()),
        Statement::OptimizeDatabase => DdlCommand::OptimizeDatabase,
        other => {
            return Err(PlannerError::query_invalid(format!(
                "{} is not a command",
                other.kind()
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ast::{CreateIndexStatement, DropClassStatement, SleepStatement};
    use crate::index::IndexType;

    #[test]
    fn test_command_plan_is_single_step() {
        let stmt = Statement::DropClass(DropClassStatement {
            name: "Person".into(),
            if_exists: true,
            unsafe_drop: false,
        });
        let plan = CommandPlanner::new(false).plan(&stmt).unwrap();
        assert_eq!(plan.step_names(), vec!["DropClassStep"]);
    }

    #[test]
    fn test_sleep_plan() {
        let plan = CommandPlanner::default()
            .plan(&Statement::Sleep(SleepStatement { millis: 5 }))
            .unwrap();
        assert_eq!(plan.step_names(), vec!["SleepStep"]);
    }

    #[test]
    fn test_index_without_fields_rejected() {
        let stmt = Statement::CreateIndex(CreateIndexStatement {
            name: "T.none".into(),
            class: "T".into(),
            fields: vec![],
            index_type: IndexType::NotUnique,
            by: None,
            if_not_exists: false,
        });
        assert!(CommandPlanner::default().plan(&stmt).is_err());
    }

    #[test]
    fn test_select_is_not_a_command() {
        let stmt = Statement::Select(Default::default());
        let err = CommandPlanner::default().plan(&stmt).unwrap_err();
        assert!(err.message().contains("SELECT"));
    }
}
