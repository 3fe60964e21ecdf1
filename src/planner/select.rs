//! SELECT planning
//!
//! Builds the step chain for a [`SelectStatement`]:
//!
//! ```text
//! source -> GLOBAL LET -> LET -> WHERE -> aggregate | projection
//!        -> UNWIND -> DISTINCT -> ORDER BY -> SKIP -> LIMIT
//! ```
//!
//! For class targets the source is chosen by matching the normalized
//! filter against the indexes of the class. A filter whose OR-branches are
//! covered by different indexes runs as a `ParallelExecStep`, one sub-plan
//! per branch. An index that already yields rows in the requested order
//! replaces the sort.

use std::collections::BTreeSet;

use tracing::debug;

use crate::database::DatabaseSession;
use crate::executor::steps::{
    AggregateStep, CountFromClassStep, CountFromIndexStep, CountFromIndexWithKeyStep, DistinctStep,
    EmptyDataGeneratorStep, FetchFromClassStep, FetchFromClustersStep, FetchFromIndexStep,
    FetchFromMetadataStep, FetchFromRidsStep, FetchFromSubqueryStep, FetchFromVariableStep,
    FilterStep, GetValueFromIndexEntryStep, GlobalLetStep, IndexKeyCondition, KeyPart, LetStep,
    LimitStep, OrderByStep, ParallelExecStep, ProjectionStep, SkipStep, StepKind, UnwindStep,
};
use crate::executor::{EngineConfig, ExecutionPlan};
use crate::index::IndexDefinition;
use crate::observability::MetricsRegistry;
use crate::schema::ClassDef;
use crate::storage::ScanDirection;

use super::ast::{ClusterRef, LetItem, OrderDirection, OrderItem, ProjectionItem, SelectStatement, Target};
use super::errors::{PlannerError, PlannerResult};
use super::expr::{Condition, Expr};
use super::index_search::{best_match, IndexMatch};
use super::normalize::{equality_first, from_dnf, to_dnf};

/// Plans SELECT statements against one session's catalog
pub struct SelectPlanner<'a> {
    session: &'a DatabaseSession,
    config: &'a EngineConfig,
    metrics: Option<&'a MetricsRegistry>,
    profiling: bool,
}

/// Access path chosen for the target
struct Source {
    steps: Vec<StepKind>,
    /// Filter still to apply after the source
    filter: Option<Condition>,
    /// The source already yields rows in `ORDER BY` order
    ordered: bool,
}

impl Source {
    fn new(steps: Vec<StepKind>, filter: Option<Condition>) -> Self {
        Self {
            steps,
            filter,
            ordered: false,
        }
    }
}

/// `ORDER BY` an index or a cluster scan could satisfy
enum OrderSpec {
    Rid(ScanDirection),
    Fields(Vec<String>, ScanDirection),
}

/// One index lookup answering one AND-block of the filter
#[derive(Debug, Clone)]
struct Branch {
    index: IndexDefinition,
    condition: IndexKeyCondition,
    clusters: Vec<u32>,
    fixed_prefix: usize,
    /// Residual conditions of every block merged into this branch; an
    /// empty entry means one block needs no residual at all
    residuals: Vec<Vec<Condition>>,
}

impl Branch {
    fn new(found: IndexMatch, clusters: Vec<u32>) -> Self {
        Self {
            fixed_prefix: found.fixed_prefix(),
            index: found.index,
            condition: found.condition,
            clusters,
            residuals: vec![found.residual],
        }
    }

    fn same_lookup(&self, other: &Branch) -> bool {
        self.index.name == other.index.name
            && self.condition == other.condition
            && self.clusters == other.clusters
    }

    fn residual(&self) -> Option<Condition> {
        if self.residuals.iter().any(Vec::is_empty) {
            return None;
        }
        Some(from_dnf(self.residuals.clone()))
    }

    fn steps(&self, direction: ScanDirection, replaced_order_by: bool) -> Vec<StepKind> {
        vec![
            StepKind::FetchFromIndex(FetchFromIndexStep {
                index: self.index.clone(),
                condition: Some(self.condition.clone()),
                direction,
                replaced_order_by,
            }),
            StepKind::GetValueFromIndexEntry(GetValueFromIndexEntryStep {
                clusters: Some(self.clusters.clone()),
            }),
        ]
    }
}

fn scan_direction(direction: OrderDirection) -> ScanDirection {
    match direction {
        OrderDirection::Asc => ScanDirection::Ascending,
        OrderDirection::Desc => ScanDirection::Descending,
    }
}

fn variable_name(name: &str) -> String {
    name.trim_start_matches('$').to_ascii_lowercase()
}

fn is_count_star(expr: &Expr) -> bool {
    matches!(expr, Expr::Function { name, args }
        if name.eq_ignore_ascii_case("count") && matches!(args.as_slice(), [Expr::Star]))
}

/// Splits LET items into those computed once per query and those
/// computed per row. An item is per-row when it reads the row or a
/// per-row variable.
fn split_lets(items: &[LetItem]) -> (Vec<LetItem>, Vec<LetItem>) {
    let mut global = Vec::new();
    let mut per_row: Vec<LetItem> = Vec::new();
    let mut row_vars = BTreeSet::new();
    for item in items {
        let mut vars = BTreeSet::new();
        item.expr.collect_variables(&mut vars);
        if item.expr.depends_on_row() || vars.iter().any(|v| row_vars.contains(v)) {
            row_vars.insert(variable_name(&item.name));
            per_row.push(item.clone());
        } else {
            global.push(item.clone());
        }
    }
    (global, per_row)
}

impl<'a> SelectPlanner<'a> {
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

    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    pub fn plan(&self, stmt: &SelectStatement) -> PlannerResult<ExecutionPlan> {
        validate(stmt)?;
        let mut plan = ExecutionPlan::new(self.profiling);

        if let Some(count) = self.plan_count(stmt)? {
            plan.chain(count);
            self.chain_skip_limit(&mut plan, stmt);
            return Ok(plan);
        }

        let (global, per_row) = split_lets(&stmt.let_items);
        let row_vars: BTreeSet<String> = per_row.iter().map(|l| variable_name(&l.name)).collect();
        let let_before_filter = stmt.where_variables().iter().any(|v| row_vars.contains(v));

        let source = self.plan_source(stmt, !let_before_filter)?;
        for step in source.steps {
            plan.chain(step);
        }
        if !global.is_empty() {
            plan.chain(StepKind::GlobalLet(GlobalLetStep { items: global }));
        }
        let mut per_row = (!per_row.is_empty()).then(|| StepKind::Let(LetStep { items: per_row }));
        if let_before_filter {
            if let Some(step) = per_row.take() {
                plan.chain(step);
            }
        }
        if let Some(condition) = source.filter {
            plan.chain(StepKind::Filter(FilterStep { condition }));
        }
        if let Some(step) = per_row {
            plan.chain(step);
        }

        if source.ordered {
            if let Some(metrics) = self.metrics {
                metrics.increment_order_by_eliminations();
            }
        }
        self.chain_projections(&mut plan, stmt, source.ordered);
        Ok(plan)
    }

    /// `count(*)` answered from size metadata
    fn plan_count(&self, stmt: &SelectStatement) -> PlannerResult<Option<StepKind>> {
        let [item] = stmt.projection.as_slice() else {
            return Ok(None);
        };
        let bare = is_count_star(&item.expr)
            && !item.exclude
            && item.nested.is_none()
            && stmt.group_by.is_empty()
            && stmt.having.is_none()
            && stmt.let_items.is_empty()
            && stmt.unwind.is_empty();
        if !bare {
            return Ok(None);
        }
        let alias = item.output_name();

        match (&stmt.target, &stmt.where_clause) {
            (Some(Target::Class { name, polymorphic }), None) => {
                let class = self.session.schema().require_class(name)?;
                let clusters = self.class_clusters(&class, *polymorphic)?;
                Ok(Some(StepKind::CountFromClass(CountFromClassStep {
                    class: class.name,
                    clusters,
                    alias,
                })))
            }
            (Some(Target::Class { name, polymorphic }), Some(filter)) => {
                let class = self.session.schema().require_class(name)?;
                if !*polymorphic && !self.session.schema().subclasses(&class.name)?.is_empty() {
                    return Ok(None);
                }
                let Some(blocks) = to_dnf(filter, self.config.max_dnf_branches) else {
                    return Ok(None);
                };
                let [block] = blocks.as_slice() else {
                    return Ok(None);
                };
                let indexes = self.session.indexes_on(&class.name)?;
                let Some(found) = best_match(&indexes, &class.name, block) else {
                    return Ok(None);
                };
                let single_key = found.own_class
                    && found.is_complete()
                    && found.index.fields.len() == 1
                    && !found.index.is_multi_value()
                    && !found.condition.has_range();
                match found.condition.equalities.as_slice() {
                    [KeyPart::Value(key)] if single_key => {
                        Ok(Some(StepKind::CountFromIndexWithKey(CountFromIndexWithKeyStep {
                            index: found.index,
                            key: key.clone(),
                            alias,
                        })))
                    }
                    _ => Ok(None),
                }
            }
            (Some(Target::Index { name }), None) => {
                let index = self.manual_index(name)?;
                Ok(Some(StepKind::CountFromIndex(CountFromIndexStep {
                    index: index.name,
                    alias,
                })))
            }
            _ => Ok(None),
        }
    }

    pub(crate) fn manual_index(&self, name: &str) -> PlannerResult<IndexDefinition> {
        if !self.config.allow_manual_index_target {
            return Err(PlannerError::target_not_allowed(format!(
                "index target 'index:{}' is disabled",
                name
            )));
        }
        self.session
            .indexes()
            .get_index(name)?
            .ok_or_else(|| PlannerError::unknown_index(name))
    }

    fn class_clusters(&self, class: &ClassDef, polymorphic: bool) -> PlannerResult<Vec<u32>> {
        if polymorphic {
            Ok(self.session.schema().polymorphic_cluster_ids(&class.name)?)
        } else {
            Ok(class.cluster_ids.clone())
        }
    }

    fn plan_source(&self, stmt: &SelectStatement, use_indexes: bool) -> PlannerResult<Source> {
        let filter = stmt.where_clause.clone();
        let Some(target) = &stmt.target else {
            return Ok(Source::new(
                vec![StepKind::EmptyDataGenerator(EmptyDataGeneratorStep)],
                filter,
            ));
        };
        match target {
            Target::Class { name, polymorphic } => {
                let class = self.session.schema().require_class(name)?;
                self.class_source(&class, *polymorphic, stmt, use_indexes)
            }
            Target::Clusters { clusters } => {
                let clusters = self.resolve_clusters(clusters)?;
                let (direction, ordered) = match order_spec(stmt) {
                    Some(OrderSpec::Rid(direction)) => (direction, true),
                    _ => (ScanDirection::Ascending, false),
                };
                let mut source = Source::new(
                    vec![StepKind::FetchFromClusters(FetchFromClustersStep { clusters, direction })],
                    filter,
                );
                source.ordered = ordered;
                Ok(source)
            }
            Target::Rids { rids } => Ok(Source::new(
                vec![StepKind::FetchFromRids(FetchFromRidsStep { rids: rids.clone() })],
                filter,
            )),
            Target::Index { name } => {
                let index = self.manual_index(name)?;
                Ok(Source::new(
                    vec![StepKind::FetchFromIndex(FetchFromIndexStep::full(
                        index,
                        ScanDirection::Ascending,
                    ))],
                    filter,
                ))
            }
            Target::Subquery { query } => {
                let plan = self.plan(query)?;
                Ok(Source::new(
                    vec![StepKind::FetchFromSubquery(FetchFromSubqueryStep { plan })],
                    filter,
                ))
            }
            Target::Variable { name } => Ok(Source::new(
                vec![StepKind::FetchFromVariable(FetchFromVariableStep {
                    name: variable_name(name),
                })],
                filter,
            )),
            Target::Metadata { name } => Ok(Source::new(
                vec![StepKind::FetchFromMetadata(FetchFromMetadataStep { target: *name })],
                filter,
            )),
        }
    }

    fn resolve_clusters(&self, refs: &[ClusterRef]) -> PlannerResult<Vec<u32>> {
        let storage = self.session.storage();
        let known = storage.clusters()?;
        refs.iter()
            .map(|r| match r {
                ClusterRef::Id(id) if known.iter().any(|c| c.id == *id) => Ok(*id),
                ClusterRef::Id(id) => Err(PlannerError::unknown_cluster(id)),
                ClusterRef::Name(name) => storage
                    .cluster_id(name)?
                    .ok_or_else(|| PlannerError::unknown_cluster(name)),
            })
            .collect()
    }

    fn class_source(
        &self,
        class: &ClassDef,
        polymorphic: bool,
        stmt: &SelectStatement,
        use_indexes: bool,
    ) -> PlannerResult<Source> {
        let clusters = self.class_clusters(class, polymorphic)?;
        let order = order_spec(stmt);

        if let (Some(filter), true) = (&stmt.where_clause, use_indexes) {
            if let Some(source) = self.indexed_source(class, polymorphic, &clusters, filter, order.as_ref())? {
                return Ok(source);
            }
        }

        let filter = stmt.where_clause.clone();
        if let Some(OrderSpec::Fields(fields, direction)) = &order {
            if let Some(index) = self.sort_index(class, fields)? {
                debug!(index = %index.name, class = %class.name, "index used for ORDER BY only");
                let mut source = Source::new(
                    vec![
                        StepKind::FetchFromIndex(FetchFromIndexStep {
                            replaced_order_by: true,
                            ..FetchFromIndexStep::full(index, *direction)
                        }),
                        StepKind::GetValueFromIndexEntry(GetValueFromIndexEntryStep {
                            clusters: Some(clusters),
                        }),
                    ],
                    filter,
                );
                source.ordered = true;
                return Ok(source);
            }
        }
        let (direction, ordered) = match order {
            Some(OrderSpec::Rid(direction)) => (direction, true),
            _ => (ScanDirection::Ascending, false),
        };
        let mut source = Source::new(
            vec![StepKind::FetchFromClass(FetchFromClassStep {
                class: class.name.clone(),
                clusters,
                direction,
            })],
            filter,
        );
        source.ordered = ordered;
        Ok(source)
    }

    /// Index fetches answering `filter`, or `None` when some OR-branch
    /// cannot use an index
    fn indexed_source(
        &self,
        class: &ClassDef,
        polymorphic: bool,
        clusters: &[u32],
        filter: &Condition,
        order: Option<&OrderSpec>,
    ) -> PlannerResult<Option<Source>> {
        let Some(blocks) = to_dnf(filter, self.config.max_dnf_branches) else {
            debug!(class = %class.name, "filter too large to normalize, scanning");
            return Ok(None);
        };
        if blocks.is_empty() {
            return Ok(None);
        }

        let mut branches: Vec<Branch> = Vec::new();
        for mut block in blocks {
            equality_first(&mut block);
            let Some(covering) = self.cover_block(class, polymorphic, clusters.to_vec(), &block)? else {
                return Ok(None);
            };
            for branch in covering {
                match branches.iter_mut().find(|b| b.same_lookup(&branch)) {
                    Some(existing) => existing.residuals.extend(branch.residuals),
                    None => branches.push(branch),
                }
            }
        }

        if let [branch] = branches.as_slice() {
            debug!(index = %branch.index.name, class = %class.name, "index selected");
            let direction = match order {
                Some(OrderSpec::Fields(fields, direction)) if index_orders(&branch.index, branch.fixed_prefix, fields) => {
                    Some(*direction)
                }
                _ => None,
            };
            let mut source = Source::new(
                branch.steps(direction.unwrap_or(ScanDirection::Ascending), direction.is_some()),
                branch.residual(),
            );
            source.ordered = direction.is_some();
            return Ok(Some(source));
        }

        debug!(class = %class.name, branches = branches.len(), "parallel index plan");
        if let Some(metrics) = self.metrics {
            metrics.increment_parallel_plans();
        }
        let plans = branches
            .iter()
            .map(|branch| {
                let mut sub = ExecutionPlan::new(self.profiling);
                for step in branch.steps(ScanDirection::Ascending, false) {
                    sub.chain(step);
                }
                if let Some(condition) = branch.residual() {
                    sub.chain(StepKind::Filter(FilterStep { condition }));
                }
                sub
            })
            .collect();
        Ok(Some(Source::new(
            vec![
                StepKind::ParallelExec(ParallelExecStep {
                    plans,
                    strategy: self.config.parallel_strategy,
                }),
                StepKind::Distinct(DistinctStep),
            ],
            None,
        )))
    }

    /// Index lookups covering one AND-block. When the class itself has no
    /// usable index, holds no records of its own and every subclass is
    /// covered, the block is answered by one lookup per subclass.
    fn cover_block(
        &self,
        class: &ClassDef,
        polymorphic: bool,
        clusters: Vec<u32>,
        block: &[Condition],
    ) -> PlannerResult<Option<Vec<Branch>>> {
        let indexes = self.session.indexes_on(&class.name)?;
        if let Some(found) = best_match(&indexes, &class.name, block) {
            return Ok(Some(vec![Branch::new(found, clusters)]));
        }
        if !polymorphic {
            return Ok(None);
        }
        let subclasses = self.session.schema().subclasses(&class.name)?;
        if subclasses.is_empty() || self.session.storage().count_class(&class.cluster_ids)? > 0 {
            return Ok(None);
        }
        let mut out = Vec::new();
        for sub in subclasses {
            let sub_clusters = self.class_clusters(&sub, true)?;
            match self.cover_block(&sub, true, sub_clusters, block)? {
                Some(branches) => out.extend(branches),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    /// An ordered index whose leading fields are the `ORDER BY` fields
    fn sort_index(&self, class: &ClassDef, fields: &[String]) -> PlannerResult<Option<IndexDefinition>> {
        Ok(self
            .session
            .indexes_on(&class.name)?
            .into_iter()
            .find(|index| index_orders(index, 0, fields)))
    }

    fn chain_projections(&self, plan: &mut ExecutionPlan, stmt: &SelectStatement, ordered: bool) {
        let aggregate = stmt.is_aggregate() || !stmt.group_by.is_empty();
        let projection = needs_projection(stmt).then(|| {
            StepKind::Projection(ProjectionStep {
                items: stmt.projection.clone(),
            })
        });

        if aggregate || stmt.distinct || !stmt.unwind.is_empty() {
            if aggregate {
                plan.chain(StepKind::Aggregate(AggregateStep {
                    projection: stmt.projection.clone(),
                    group_by: stmt.group_by.clone(),
                    having: stmt.having.clone(),
                }));
            } else if let Some(step) = projection {
                plan.chain(step);
            }
            if !stmt.unwind.is_empty() {
                plan.chain(StepKind::Unwind(UnwindStep {
                    fields: stmt.unwind.clone(),
                }));
            }
            if stmt.distinct {
                plan.chain(StepKind::Distinct(DistinctStep));
            }
            if !ordered {
                self.chain_order_by(plan, stmt, rewrite_order_by(stmt));
            }
            self.chain_skip_limit(plan, stmt);
            return;
        }

        let project_first = projection.is_some() && !ordered && orders_by_outputs(stmt);
        if project_first {
            if let Some(step) = projection {
                plan.chain(step);
            }
            self.chain_order_by(plan, stmt, rewrite_order_by(stmt));
            self.chain_skip_limit(plan, stmt);
        } else {
            if !ordered {
                self.chain_order_by(plan, stmt, stmt.order_by.clone());
            }
            self.chain_skip_limit(plan, stmt);
            if let Some(step) = projection {
                plan.chain(step);
            }
        }
    }

    fn chain_order_by(&self, plan: &mut ExecutionPlan, stmt: &SelectStatement, items: Vec<OrderItem>) {
        if items.is_empty() {
            return;
        }
        plan.chain(StepKind::OrderBy(OrderByStep {
            items,
            skip: stmt.skip.clone(),
            limit: stmt.limit.clone(),
        }));
    }

    fn chain_skip_limit(&self, plan: &mut ExecutionPlan, stmt: &SelectStatement) {
        if let Some(expr) = &stmt.skip {
            plan.chain(StepKind::Skip(SkipStep { expr: expr.clone() }));
        }
        if let Some(expr) = &stmt.limit {
            plan.chain(StepKind::Limit(LimitStep { expr: expr.clone() }));
        }
    }
}

/// Plan-time checks on clause combinations
fn validate(stmt: &SelectStatement) -> PlannerResult<()> {
    if stmt.where_clause.as_ref().is_some_and(Condition::contains_aggregate) {
        return Err(PlannerError::invalid_aggregate(
            "aggregate functions are not allowed in WHERE",
        ));
    }
    if stmt.let_items.iter().any(|l| l.expr.contains_aggregate()) {
        return Err(PlannerError::invalid_aggregate(
            "aggregate functions are not allowed in LET",
        ));
    }
    if let Some(expr) = stmt.group_by.iter().find(|e| e.contains_aggregate()) {
        return Err(PlannerError::invalid_aggregate(format!(
            "cannot GROUP BY aggregate function {}",
            expr
        )));
    }
    if stmt.is_aggregate() || !stmt.group_by.is_empty() {
        for item in &stmt.projection {
            if item.exclude || matches!(item.expr, Expr::Star) {
                return Err(PlannerError::invalid_aggregate(format!(
                    "'{}' cannot be combined with aggregation",
                    item.expr
                )));
            }
            let grouped = item.expr.contains_aggregate()
                || item.expr.is_constant()
                || stmt.group_by.contains(&item.expr);
            if !grouped {
                return Err(PlannerError::invalid_aggregate(format!(
                    "'{}' is neither aggregated nor grouped",
                    item.expr
                )));
            }
        }
    }
    if !stmt.unwind.is_empty() && stmt.projection.iter().any(|p| p.exclude) {
        return Err(PlannerError::query_invalid(
            "UNWIND cannot be combined with field exclusion",
        ));
    }
    Ok(())
}

/// False for `SELECT *` and `SELECT` without a projection list
fn needs_projection(stmt: &SelectStatement) -> bool {
    match stmt.projection.as_slice() {
        [] => false,
        [only] => !(matches!(only.expr, Expr::Star) && only.alias.is_none() && only.nested.is_none()),
        _ => true,
    }
}

fn output_item<'s>(stmt: &'s SelectStatement, name: &str) -> Option<&'s ProjectionItem> {
    stmt.projection
        .iter()
        .find(|p| !p.exclude && p.output_name().eq_ignore_ascii_case(name))
}

/// True when every `ORDER BY` item names a projected column
fn orders_by_outputs(stmt: &SelectStatement) -> bool {
    !stmt.order_by.is_empty()
        && stmt.order_by.iter().all(|o| {
            o.expr.as_plain_field().is_some_and(|f| output_item(stmt, f).is_some())
                || stmt.projection.iter().any(|p| !p.exclude && p.expr == o.expr)
        })
}

/// `ORDER BY` items rewritten to read the projected column when they
/// repeat a projection expression
fn rewrite_order_by(stmt: &SelectStatement) -> Vec<OrderItem> {
    stmt.order_by
        .iter()
        .map(|o| match stmt.projection.iter().find(|p| !p.exclude && p.expr == o.expr) {
            Some(item) if o.expr.as_plain_field() != Some(item.output_name().as_str()) => OrderItem {
                expr: Expr::field(&item.output_name()),
                direction: o.direction,
            },
            _ => o.clone(),
        })
        .collect()
}

/// The order an index scan or cluster scan could produce, if any
fn order_spec(stmt: &SelectStatement) -> Option<OrderSpec> {
    let first = stmt.order_by.first()?;
    if stmt.is_aggregate() || !stmt.group_by.is_empty() {
        return None;
    }
    let direction = first.effective_direction();
    if stmt.order_by.iter().any(|o| o.effective_direction() != direction) {
        return None;
    }
    let direction = scan_direction(direction);
    if let [only] = stmt.order_by.as_slice() {
        if only.expr.is_rid_attribute() {
            return Some(OrderSpec::Rid(direction));
        }
    }
    let mut fields = Vec::with_capacity(stmt.order_by.len());
    for item in &stmt.order_by {
        let field = item.expr.as_plain_field()?;
        // a projected column of that name must be the field itself
        if let Some(output) = output_item(stmt, field) {
            if output.expr.as_plain_field().map(str::to_ascii_lowercase) != Some(field.to_ascii_lowercase()) {
                return None;
            }
        }
        fields.push(field.to_string());
    }
    Some(OrderSpec::Fields(fields, direction))
}

/// True when scanning `index` yields rows ordered by `fields`, given that
/// the first `fixed` key fields hold a single value
fn index_orders(index: &IndexDefinition, fixed: usize, fields: &[String]) -> bool {
    if index.index_type.is_hash() || index.is_multi_value() || fields.is_empty() {
        return false;
    }
    (0..=fixed).any(|start| {
        index.fields.len() >= start + fields.len()
            && index.fields[start..start + fields.len()]
                .iter()
                .zip(fields)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}
