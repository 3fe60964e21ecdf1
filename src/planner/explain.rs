//! EXPLAIN output
//!
//! Summarizes a plan (or the reason planning failed) in a stable form,
//! both as text and as JSON.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::executor::{ExecutionPlan, StepDescription, StepKind};

use super::errors::PlannerError;

/// Explain plan output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainPlan {
    /// Whether planning succeeded
    pub accepted: bool,
    /// Statement keyword, e.g. `SELECT`
    pub statement: String,
    pub steps: Vec<StepDescription>,
    /// Indexes read by any step, sub-plans included
    pub indexes: Vec<String>,
    /// True when an index scan makes the ORDER BY step unnecessary
    pub order_by_eliminated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip)]
    rendered: String,
}

impl ExplainPlan {
    pub fn from_plan(statement: &str, plan: &ExecutionPlan) -> Self {
        let mut indexes = BTreeSet::new();
        collect_indexes(plan, &mut indexes);
        Self {
            accepted: true,
            statement: statement.to_string(),
            steps: plan.describe(),
            indexes: indexes.into_iter().collect(),
            order_by_eliminated: plan.any_step(&|kind| {
                matches!(kind, StepKind::FetchFromIndex(s) if s.replaced_order_by)
            }),
            rejection_code: None,
            rejection_reason: None,
            rendered: plan.pretty_print(2),
        }
    }

    pub fn from_error(statement: &str, err: &PlannerError) -> Self {
        Self {
            accepted: false,
            statement: statement.to_string(),
            steps: Vec::new(),
            indexes: Vec::new(),
            order_by_eliminated: false,
            rejection_code: Some(err.code().code().to_string()),
            rejection_reason: Some(err.message().to_string()),
            rendered: String::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn collect_indexes(plan: &ExecutionPlan, out: &mut BTreeSet<String>) {
    for step in plan.steps() {
        match step.kind() {
            StepKind::FetchFromIndex(s) => {
                out.insert(s.index.name.clone());
            }
            StepKind::CountFromIndex(s) => {
                out.insert(s.index.clone());
            }
            StepKind::CountFromIndexWithKey(s) => {
                out.insert(s.index.name.clone());
            }
            _ => {}
        }
        for sub in step.kind().sub_plans() {
            collect_indexes(sub, out);
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN {} ===", self.statement)?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            if !self.indexes.is_empty() {
                writeln!(f, "Indexes: {}", self.indexes.join(", "))?;
            }
            if self.order_by_eliminated {
                writeln!(f, "Order By: served by index")?;
            }
            writeln!(f, "Steps:")?;
            write!(f, "{}", self.rendered)?;
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::executor::EngineConfig;
    use crate::index::{IndexDefinition, IndexType};
    use crate::planner::ast::{OrderItem, SelectStatement};
    use crate::planner::expr::Expr;
    use crate::planner::select::SelectPlanner;

    fn plan_people(order: bool) -> ExecutionPlan {
        let db = Database::new("test").unwrap();
        let session = db.session();
        session.create_class("Person", Vec::new(), false).unwrap();
        session
            .create_index(IndexDefinition::new(
                "Person.name",
                "Person",
                vec!["name".to_string()],
                IndexType::NotUnique,
            ))
            .unwrap();
        let mut query = SelectStatement::from_class("Person");
        if order {
            query = query.order_by(OrderItem::asc(Expr::field("name")));
        }
        let config = EngineConfig::default();
        SelectPlanner::new(&session, &config).plan(&query).unwrap()
    }

    #[test]
    fn test_explain_accepted_plan() {
        let plan = plan_people(true);
        let explain = ExplainPlan::from_plan("SELECT", &plan);

        assert!(explain.accepted);
        assert_eq!(explain.indexes, vec!["Person.name".to_string()]);
        assert!(explain.order_by_eliminated);

        let output = format!("{}", explain);
        assert!(output.contains("ACCEPTED"));
        assert!(output.contains("FetchFromIndexStep"));
    }

    #[test]
    fn test_explain_full_scan_uses_no_index() {
        let explain = ExplainPlan::from_plan("SELECT", &plan_people(false));
        assert!(explain.indexes.is_empty());
        assert!(!explain.order_by_eliminated);
        assert_eq!(explain.to_json()["steps"][0]["name"], "FetchFromClassStep");
    }

    #[test]
    fn test_explain_rejected_plan() {
        let err = PlannerError::unknown_class("Nope");
        let explain = ExplainPlan::from_error("SELECT", &err);

        assert!(!explain.accepted);
        let output = format!("{}", explain);
        assert!(output.contains("REJECTED"));
        assert!(output.contains(err.code().code()));
        assert!(explain.to_json().get("rejectionCode").is_some());
    }

    #[test]
    fn test_explain_deterministic() {
        let first = format!("{}", ExplainPlan::from_plan("SELECT", &plan_people(true)));
        let second = format!("{}", ExplainPlan::from_plan("SELECT", &plan_people(true)));
        assert_eq!(first, second);
    }
}
