//! INSERT, UPDATE and DELETE planning
//!
//! UPDATE and DELETE reuse the SELECT pipeline to find their records, so
//! they get the same index selection. Their plans end in a `CountStep`
//! reporting `{count: n}`.

use crate::database::DatabaseSession;
use crate::executor::steps::{
    CheckClassTypeStep, CheckClusterTypeStep, ConvertToResultInternalStep,
    ConvertToUpdatableResultStep, CountStep, DeleteFromIndexStep, DeleteStep, FetchFromIndexStep,
    FetchFromSubqueryStep, FilterStep, InsertSource, InsertStep, LimitStep, StepKind, UpdateStep,
};
use crate::executor::ExecutionPlan;
use crate::index::IndexDefinition;
use crate::schema::{EDGE_CLASS, VERTEX_CLASS};
use crate::storage::ScanDirection;

use super::ast::{
    ClusterRef, DeleteStatement, DeleteVertexStatement, InsertStatement, SelectStatement, Target,
    UpdateStatement,
};
use super::errors::{PlannerError, PlannerResult};
use super::expr::{Condition, Expr};
use super::index_search::match_index;
use super::select::SelectPlanner;

pub struct MutationPlanner<'a> {
    session: &'a DatabaseSession,
    select: SelectPlanner<'a>,
    profiling: bool,
}

fn count_step() -> StepKind {
    StepKind::Count(CountStep {
        alias: "count".to_string(),
    })
}

impl<'a> MutationPlanner<'a> {
    pub fn new(session: &'a DatabaseSession, select: SelectPlanner<'a>, profiling: bool) -> Self {
        Self {
            session,
            select,
            profiling,
        }
    }

    pub fn plan_insert(&self, stmt: &InsertStatement) -> PlannerResult<ExecutionPlan> {
        let class = self.session.schema().require_class(&stmt.class)?;
        if class.is_abstract {
            return Err(PlannerError::query_invalid(format!(
                "cannot insert into abstract class '{}'",
                class.name
            )));
        }
        let cluster = match &stmt.cluster {
            None => None,
            Some(cluster) => {
                let id = self.resolve_cluster(cluster)?;
                if !class.cluster_ids.contains(&id) {
                    return Err(PlannerError::query_invalid(format!(
                        "cluster {} does not belong to class '{}'",
                        cluster, class.name
                    )));
                }
                Some(id)
            }
        };

        let mut plan = ExecutionPlan::new(self.profiling);
        let source = match &stmt.from {
            Some(query) => {
                let sub = self.select.plan(query)?;
                plan.chain(StepKind::FetchFromSubquery(FetchFromSubqueryStep { plan: sub }));
                plan.chain(StepKind::ConvertToResultInternal(ConvertToResultInternalStep));
                InsertSource::Upstream
            }
            None if stmt.rows.is_empty() => InsertSource::Values(vec![Vec::new()]),
            None => InsertSource::Values(stmt.rows.clone()),
        };
        plan.chain(StepKind::Insert(InsertStep {
            class: class.name,
            cluster,
            source,
        }));
        Ok(plan)
    }

    pub fn plan_update(&self, stmt: &UpdateStatement) -> PlannerResult<ExecutionPlan> {
        if stmt.set.is_empty() && stmt.remove.is_empty() {
            return Err(PlannerError::query_invalid("UPDATE needs SET or REMOVE"));
        }
        let mut plan = self.select_records(&stmt.target, &stmt.where_clause, &stmt.limit)?;
        plan.chain(StepKind::ConvertToUpdatableResult(ConvertToUpdatableResultStep));
        plan.chain(StepKind::Update(UpdateStep {
            set: stmt.set.clone(),
            remove: stmt.remove.clone(),
        }));
        plan.chain(count_step());
        Ok(plan)
    }

    /// Plain DELETE refuses vertices and edges unless `UNSAFE` is given,
    /// since removing them leaves dangling links
    pub fn plan_delete(&self, stmt: &DeleteStatement) -> PlannerResult<ExecutionPlan> {
        if let Target::Index { name } = &stmt.target {
            return self.plan_delete_from_index(name, stmt);
        }
        if !stmt.unsafe_delete {
            for class in self.target_classes(&stmt.target)? {
                for graph in [VERTEX_CLASS, EDGE_CLASS] {
                    if self.is_graph_class(&class, graph)? {
                        return Err(PlannerError::class_type_mismatch(format!(
                            "'{}' is a {} class; use DELETE VERTEX/EDGE or add UNSAFE",
                            class,
                            if graph == VERTEX_CLASS { "vertex" } else { "edge" }
                        )));
                    }
                }
            }
        }
        let mut plan = self.select_records(&stmt.target, &stmt.where_clause, &stmt.limit)?;
        plan.chain(StepKind::Delete(DeleteStep { delete_edges: false }));
        plan.chain(count_step());
        Ok(plan)
    }

    /// `DELETE FROM index:<name> [WHERE ...]` removes index entries, not
    /// records. Conditions on `key` of a single-field index narrow the
    /// index scan; anything else filters the `{key, rid}` rows.
    fn plan_delete_from_index(&self, name: &str, stmt: &DeleteStatement) -> PlannerResult<ExecutionPlan> {
        let index = self.select.manual_index(name)?;
        let mut fetch = FetchFromIndexStep::full(index.clone(), ScanDirection::Ascending);
        let mut residual = stmt.where_clause.clone();
        if let (Some(condition), [_]) = (&stmt.where_clause, index.fields.as_slice()) {
            let block = match condition {
                Condition::And { items } => items.clone(),
                other => vec![other.clone()],
            };
            let by_key = IndexDefinition {
                fields: vec!["key".to_string()],
                ..index.clone()
            };
            if let Some(found) = match_index(&by_key, &index.class_name, &block) {
                fetch.condition = Some(found.condition);
                residual = match found.residual.len() {
                    0 => None,
                    1 => found.residual.into_iter().next(),
                    _ => Some(Condition::and(found.residual)),
                };
            }
        }

        let mut plan = ExecutionPlan::new(self.profiling);
        plan.chain(StepKind::FetchFromIndex(fetch));
        if let Some(condition) = residual {
            plan.chain(StepKind::Filter(FilterStep { condition }));
        }
        if let Some(limit) = &stmt.limit {
            plan.chain(StepKind::Limit(LimitStep { expr: limit.clone() }));
        }
        plan.chain(StepKind::DeleteFromIndex(DeleteFromIndexStep {
            index: index.name.clone(),
            key_width: index.fields.len(),
        }));
        plan.chain(count_step());
        Ok(plan)
    }

    pub fn plan_delete_vertex(&self, stmt: &DeleteVertexStatement) -> PlannerResult<ExecutionPlan> {
        let gate = match &stmt.target {
            Target::Class { name, .. } => Some(StepKind::CheckClassType(CheckClassTypeStep {
                class: name.clone(),
                parent: VERTEX_CLASS.to_string(),
            })),
            Target::Clusters { clusters } => {
                let clusters = clusters
                    .iter()
                    .map(|c| self.resolve_cluster(c))
                    .collect::<PlannerResult<Vec<u32>>>()?;
                Some(StepKind::CheckClusterType(CheckClusterTypeStep {
                    clusters,
                    class: VERTEX_CLASS.to_string(),
                }))
            }
            Target::Rids { .. } => {
                for class in self.target_classes(&stmt.target)? {
                    if !self.is_graph_class(&class, VERTEX_CLASS)? {
                        return Err(PlannerError::class_type_mismatch(format!(
                            "record of class '{}' is not a vertex",
                            class
                        )));
                    }
                }
                None
            }
            other => {
                return Err(PlannerError::query_invalid(format!(
                    "cannot DELETE VERTEX from {}",
                    other
                )))
            }
        };
        let mut plan = self.select_records(&stmt.target, &stmt.where_clause, &stmt.limit)?;
        if let Some(gate) = gate {
            plan.chain(gate);
        }
        plan.chain(StepKind::Delete(DeleteStep { delete_edges: true }));
        plan.chain(count_step());
        Ok(plan)
    }

    /// The SELECT part of an UPDATE or DELETE
    fn select_records(
        &self,
        target: &Target,
        where_clause: &Option<Condition>,
        limit: &Option<Expr>,
    ) -> PlannerResult<ExecutionPlan> {
        match target {
            Target::Class { .. } | Target::Clusters { .. } | Target::Rids { .. } | Target::Subquery { .. } => {}
            other => {
                return Err(PlannerError::query_invalid(format!(
                    "{} cannot be modified",
                    other
                )))
            }
        }
        let query = SelectStatement {
            target: Some(target.clone()),
            where_clause: where_clause.clone(),
            limit: limit.clone(),
            ..SelectStatement::default()
        };
        self.select.plan(&query)
    }

    fn resolve_cluster(&self, cluster: &ClusterRef) -> PlannerResult<u32> {
        let storage = self.session.storage();
        match cluster {
            ClusterRef::Id(id) => {
                if storage.clusters()?.iter().any(|c| c.id == *id) {
                    Ok(*id)
                } else {
                    Err(PlannerError::unknown_cluster(id))
                }
            }
            ClusterRef::Name(name) => storage
                .cluster_id(name)?
                .ok_or_else(|| PlannerError::unknown_cluster(name)),
        }
    }

    /// Classes whose records a target can reach, as far as they are known
    /// before execution
    fn target_classes(&self, target: &Target) -> PlannerResult<Vec<String>> {
        let schema = self.session.schema();
        Ok(match target {
            Target::Class { name, .. } => vec![schema.require_class(name)?.name],
            Target::Clusters { clusters } => {
                let mut out = Vec::new();
                for cluster in clusters {
                    let id = self.resolve_cluster(cluster)?;
                    if let Some(class) = schema.class_of_cluster(id)? {
                        out.push(class.name);
                    }
                }
                out
            }
            Target::Rids { rids } => {
                let mut out = Vec::new();
                for rid in rids {
                    if let Some(record) = self.session.fetch_record(*rid)? {
                        out.push(record.class_name);
                    }
                }
                out
            }
            _ => Vec::new(),
        })
    }

    fn is_graph_class(&self, class: &str, base: &str) -> PlannerResult<bool> {
        let schema = self.session.schema();
        if schema.get_class(base)?.is_none() {
            return Ok(false);
        }
        Ok(schema.is_subclass_of(class, base)?)
    }
}
