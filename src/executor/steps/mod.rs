//! The closed set of execution steps
//!
//! Source steps ignore their upstream; every other step pulls from it.

mod aggregate;
mod commands;
mod count;
mod fetch;
mod filter;
mod index;
mod metadata;
mod mutation;
mod order;
mod parallel;
mod projection;
mod structural;

pub use aggregate::AggregateStep;
pub use commands::{CommandStep, DdlCommand};
pub use count::{CountFromClassStep, CountFromIndexStep, CountFromIndexWithKeyStep, CountStep};
pub use fetch::{
    FetchFromClassStep, FetchFromClustersStep, FetchFromRidsStep, FetchFromSubqueryStep,
    FetchFromVariableStep,
};
pub use filter::{CheckClassTypeStep, CheckClusterTypeStep, FilterStep};
pub use index::{FetchFromIndexStep, GetValueFromIndexEntryStep, IndexKeyCondition, KeyPart, RangeBound};
pub use metadata::FetchFromMetadataStep;
pub use mutation::{DeleteFromIndexStep, DeleteStep, InsertSource, InsertStep, UpdateStep};
pub use order::OrderByStep;
pub use parallel::ParallelExecStep;
pub use projection::{
    ConvertToResultInternalStep, ConvertToUpdatableResultStep, GlobalLetStep, LetStep, ProjectionStep,
};
pub use structural::{DistinctStep, EmptyDataGeneratorStep, LimitStep, SkipStep, UnwindStep};

use super::context::ExecutionContext;
use super::errors::ExecResult;
use super::plan::ExecutionPlan;
use super::step::Upstream;
use super::stream::ExecutionStream;

#[derive(Debug, Clone)]
pub enum StepKind {
    FetchFromClass(FetchFromClassStep),
    FetchFromClusters(FetchFromClustersStep),
    FetchFromRids(FetchFromRidsStep),
    FetchFromVariable(FetchFromVariableStep),
    FetchFromSubquery(FetchFromSubqueryStep),
    FetchFromMetadata(FetchFromMetadataStep),
    FetchFromIndex(FetchFromIndexStep),
    GetValueFromIndexEntry(GetValueFromIndexEntryStep),
    EmptyDataGenerator(EmptyDataGeneratorStep),
    CountFromClass(CountFromClassStep),
    CountFromIndex(CountFromIndexStep),
    CountFromIndexWithKey(CountFromIndexWithKeyStep),
    Count(CountStep),
    ParallelExec(ParallelExecStep),
    CheckClassType(CheckClassTypeStep),
    CheckClusterType(CheckClusterTypeStep),
    GlobalLet(GlobalLetStep),
    Let(LetStep),
    Filter(FilterStep),
    Aggregate(AggregateStep),
    Projection(ProjectionStep),
    Distinct(DistinctStep),
    OrderBy(OrderByStep),
    Skip(SkipStep),
    Limit(LimitStep),
    Unwind(UnwindStep),
    ConvertToResultInternal(ConvertToResultInternalStep),
    ConvertToUpdatableResult(ConvertToUpdatableResultStep),
    Insert(InsertStep),
    Update(UpdateStep),
    Delete(DeleteStep),
    DeleteFromIndex(DeleteFromIndexStep),
    Command(CommandStep),
}

impl StepKind {
    /// Name shown in plan output
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::FetchFromClass(_) => "FetchFromClassStep",
            StepKind::FetchFromClusters(_) => "FetchFromClustersStep",
            StepKind::FetchFromRids(_) => "FetchFromRidsStep",
            StepKind::FetchFromVariable(_) => "FetchFromVariableStep",
            StepKind::FetchFromSubquery(_) => "SubQueryStep",
            StepKind::FetchFromMetadata(_) => "FetchFromMetadataStep",
            StepKind::FetchFromIndex(_) => "FetchFromIndexStep",
            StepKind::GetValueFromIndexEntry(_) => "GetValueFromIndexEntryStep",
            StepKind::EmptyDataGenerator(_) => "EmptyDataGeneratorStep",
            StepKind::CountFromClass(_) => "CountFromClassStep",
            StepKind::CountFromIndex(_) => "CountFromIndexStep",
            StepKind::CountFromIndexWithKey(_) => "CountFromIndexWithKeyStep",
            StepKind::Count(_) => "CountStep",
            StepKind::ParallelExec(_) => "ParallelExecStep",
            StepKind::CheckClassType(_) => "CheckClassTypeStep",
            StepKind::CheckClusterType(_) => "CheckClusterTypeStep",
            StepKind::GlobalLet(_) => "GlobalLetStep",
            StepKind::Let(_) => "LetStep",
            StepKind::Filter(_) => "FilterStep",
            StepKind::Aggregate(_) => "AggregateProjectionStep",
            StepKind::Projection(_) => "ProjectionCalculationStep",
            StepKind::Distinct(_) => "DistinctExecutionStep",
            StepKind::OrderBy(_) => "OrderByStep",
            StepKind::Skip(_) => "SkipExecutionStep",
            StepKind::Limit(_) => "LimitExecutionStep",
            StepKind::Unwind(_) => "UnwindStep",
            StepKind::ConvertToResultInternal(_) => "ConvertToResultInternalStep",
            StepKind::ConvertToUpdatableResult(_) => "ConvertToUpdatableResultStep",
            StepKind::Insert(_) => "InsertStep",
            StepKind::Update(_) => "UpdateStep",
            StepKind::Delete(_) => "DeleteStep",
            StepKind::DeleteFromIndex(_) => "DeleteFromIndexStep",
            StepKind::Command(c) => c.name(),
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            StepKind::FetchFromClass(s) => Some(s.details()),
            StepKind::FetchFromClusters(s) => Some(s.details()),
            StepKind::FetchFromRids(s) => Some(s.details()),
            StepKind::FetchFromVariable(s) => Some(s.details()),
            StepKind::FetchFromMetadata(s) => Some(s.details()),
            StepKind::FetchFromIndex(s) => Some(s.details()),
            StepKind::GetValueFromIndexEntry(s) => s.details(),
            StepKind::CountFromClass(s) => Some(s.details()),
            StepKind::CountFromIndex(s) => Some(s.details()),
            StepKind::CountFromIndexWithKey(s) => Some(s.details()),
            StepKind::ParallelExec(s) => Some(s.details()),
            StepKind::CheckClassType(s) => Some(s.details()),
            StepKind::CheckClusterType(s) => Some(s.details()),
            StepKind::GlobalLet(s) => Some(s.details()),
            StepKind::Let(s) => Some(s.details()),
            StepKind::Filter(s) => Some(s.details()),
            StepKind::Aggregate(s) => Some(s.details()),
            StepKind::Projection(s) => Some(s.details()),
            StepKind::OrderBy(s) => Some(s.details()),
            StepKind::Skip(s) => Some(s.details()),
            StepKind::Limit(s) => Some(s.details()),
            StepKind::Unwind(s) => Some(s.details()),
            StepKind::Insert(s) => Some(s.details()),
            StepKind::Update(s) => Some(s.details()),
            StepKind::Delete(s) => s.details(),
            StepKind::DeleteFromIndex(s) => Some(s.details()),
            StepKind::Command(s) => s.details(),
            StepKind::FetchFromSubquery(_)
            | StepKind::EmptyDataGenerator(_)
            | StepKind::Count(_)
            | StepKind::Distinct(_)
            | StepKind::ConvertToResultInternal(_)
            | StepKind::ConvertToUpdatableResult(_) => None,
        }
    }

    /// Nested plans, for introspection
    pub fn sub_plans(&self) -> &[ExecutionPlan] {
        match self {
            StepKind::ParallelExec(s) => &s.plans,
            StepKind::FetchFromSubquery(s) => std::slice::from_ref(&s.plan),
            _ => &[],
        }
    }

    /// True for steps that produce rows without an upstream
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            StepKind::FetchFromClass(_)
                | StepKind::FetchFromClusters(_)
                | StepKind::FetchFromRids(_)
                | StepKind::FetchFromVariable(_)
                | StepKind::FetchFromSubquery(_)
                | StepKind::FetchFromMetadata(_)
                | StepKind::FetchFromIndex(_)
                | StepKind::EmptyDataGenerator(_)
                | StepKind::CountFromClass(_)
                | StepKind::CountFromIndex(_)
                | StepKind::CountFromIndexWithKey(_)
                | StepKind::ParallelExec(_)
                | StepKind::Command(_)
        )
    }

    pub(crate) fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        match self {
            StepKind::FetchFromClass(s) => s.start(ctx),
            StepKind::FetchFromClusters(s) => s.start(ctx),
            StepKind::FetchFromRids(s) => s.start(),
            StepKind::FetchFromVariable(s) => s.start(ctx),
            StepKind::FetchFromSubquery(s) => s.start(ctx),
            StepKind::FetchFromMetadata(s) => s.start(ctx),
            StepKind::FetchFromIndex(s) => s.start(ctx),
            StepKind::GetValueFromIndexEntry(s) => s.start(upstream, ctx),
            StepKind::EmptyDataGenerator(s) => s.start(),
            StepKind::CountFromClass(s) => s.start(ctx),
            StepKind::CountFromIndex(s) => s.start(ctx),
            StepKind::CountFromIndexWithKey(s) => s.start(ctx),
            StepKind::Count(s) => s.start(upstream, ctx),
            StepKind::ParallelExec(s) => s.start(),
            StepKind::CheckClassType(s) => s.start(upstream, ctx),
            StepKind::CheckClusterType(s) => s.start(upstream, ctx),
            StepKind::GlobalLet(s) => s.start(upstream, ctx),
            StepKind::Let(s) => s.start(upstream, ctx),
            StepKind::Filter(s) => s.start(upstream, ctx),
            StepKind::Aggregate(s) => s.start(upstream, ctx),
            StepKind::Projection(s) => s.start(upstream, ctx),
            StepKind::Distinct(s) => s.start(upstream, ctx),
            StepKind::OrderBy(s) => s.start(upstream, ctx),
            StepKind::Skip(s) => s.start(upstream, ctx),
            StepKind::Limit(s) => s.start(upstream, ctx),
            StepKind::Unwind(s) => s.start(upstream, ctx),
            StepKind::ConvertToResultInternal(s) => s.start(upstream, ctx),
            StepKind::ConvertToUpdatableResult(s) => s.start(upstream, ctx),
            StepKind::Insert(s) => s.start(upstream, ctx),
            StepKind::Update(s) => s.start(upstream, ctx),
            StepKind::Delete(s) => s.start(upstream, ctx),
            StepKind::DeleteFromIndex(s) => s.start(upstream, ctx),
            StepKind::Command(s) => s.start(ctx),
        }
    }
}
